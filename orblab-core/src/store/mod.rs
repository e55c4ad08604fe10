//! Bar store — read-only access to time-ordered minute bars.
//!
//! The store is an external collaborator: the engine only reads from it.
//! Contract: bars come back ordered by timestamp with no duplicates; gaps
//! are represented by absence, never zero-filled. A duplicate or
//! out-of-order timestamp is a corruption of the source data and is fatal
//! for the query; a missing instrument or an unreachable backend is
//! recoverable (the caller skips the day).

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::{InstrumentId, MinuteBar};

mod csv_store;
mod memory;

pub use csv_store::CsvBarStore;
pub use memory::MemoryBarStore;

/// Errors from a bar store query.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No data exists for the instrument — recoverable, skip the day.
    #[error("no bar data for {0}")]
    NoData(InstrumentId),
    /// The backend did not answer in time — recoverable, skip the day.
    #[error("bar store timed out for {0}")]
    Timeout(InstrumentId),
    /// Duplicate timestamp in source data — fatal for the build run.
    #[error("duplicate bar timestamp for {instrument} at {ts}")]
    DuplicateTimestamp {
        instrument: InstrumentId,
        ts: NaiveDateTime,
    },
    /// Bars not in chronological order — fatal for the build run.
    #[error("out-of-order bar for {instrument} at {ts}")]
    OutOfOrder {
        instrument: InstrumentId,
        ts: NaiveDateTime,
    },
    /// A bar failed OHLC sanity checks — fatal for the build run.
    #[error("insane bar for {instrument} at {ts}")]
    InsaneBar {
        instrument: InstrumentId,
        ts: NaiveDateTime,
    },
    #[error("bar store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bar store parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Whether the caller may treat this as a skipped day rather than
    /// aborting the build.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::NoData(_) | StoreError::Timeout(_))
    }
}

/// Read-only source of ordered minute bars.
///
/// `Send + Sync` so the grid search can fan simulation calls across
/// worker threads against one shared store.
pub trait BarStore: Send + Sync {
    /// Bars for `instrument` with exchange-local timestamps in
    /// `[start, end)`, ascending. An empty result is a legitimate gap.
    fn bars(
        &self,
        instrument: &InstrumentId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<MinuteBar>, StoreError>;
}

/// Validate ordering, uniqueness, and sanity of a bar series.
///
/// Shared by store implementations at load time so corrupt source data is
/// rejected at the boundary instead of surfacing as a wrong simulation.
pub(crate) fn validate_series(
    instrument: &InstrumentId,
    bars: &[MinuteBar],
) -> Result<(), StoreError> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(StoreError::InsaneBar {
                instrument: instrument.clone(),
                ts: bar.ts_local,
            });
        }
        if i > 0 {
            let prev = &bars[i - 1];
            if bar.ts_utc == prev.ts_utc {
                return Err(StoreError::DuplicateTimestamp {
                    instrument: instrument.clone(),
                    ts: bar.ts_local,
                });
            }
            if bar.ts_utc < prev.ts_utc {
                return Err(StoreError::OutOfOrder {
                    instrument: instrument.clone(),
                    ts: bar.ts_local,
                });
            }
        }
    }
    Ok(())
}
