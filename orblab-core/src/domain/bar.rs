//! MinuteBar — the fundamental intraday market data unit.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::InstrumentId;

/// One-minute OHLCV bar for a single instrument.
///
/// Carries both the UTC timestamp (store ordering, deduplication) and the
/// exchange-local timestamp (session windows, scan boundaries). Gaps in the
/// source data are represented by absence, never by zero-filled bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub instrument: InstrumentId,
    pub ts_utc: DateTime<Utc>,
    pub ts_local: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl MinuteBar {
    /// Basic OHLC sanity check: high >= low, high/low bracket open and close,
    /// and all prices are finite and positive.
    pub fn is_sane(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite();
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}
