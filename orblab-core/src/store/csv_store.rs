//! CSV-backed bar store.
//!
//! One file per instrument (`<dir>/<instrument>.csv`) with columns
//! `ts_utc,open,high,low,close,volume`, timestamps RFC 3339. Local
//! timestamps are derived from the configured exchange time zone at load
//! time; the file itself stays zone-agnostic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use super::{validate_series, BarStore, StoreError};
use crate::domain::{InstrumentId, MinuteBar};

#[derive(Debug, Deserialize)]
struct CsvRow {
    ts_utc: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// Bar store reading per-instrument CSV files under a data directory.
///
/// Each file is parsed and validated once, then served from memory.
pub struct CsvBarStore {
    dir: PathBuf,
    tz: Tz,
    loaded: Mutex<HashMap<InstrumentId, Vec<MinuteBar>>>,
}

impl CsvBarStore {
    pub fn new(dir: impl AsRef<Path>, tz: Tz) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            tz,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    fn load(&self, instrument: &InstrumentId) -> Result<Vec<MinuteBar>, StoreError> {
        let path = self.dir.join(format!("{instrument}.csv"));
        if !path.exists() {
            return Err(StoreError::NoData(instrument.clone()));
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| match e.kind() {
            csv::ErrorKind::Io(_) => StoreError::NoData(instrument.clone()),
            _ => StoreError::Parse(e.to_string()),
        })?;

        let mut bars = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record.map_err(|e| StoreError::Parse(e.to_string()))?;
            let ts_local = row.ts_utc.with_timezone(&self.tz).naive_local();
            bars.push(MinuteBar {
                instrument: instrument.clone(),
                ts_utc: row.ts_utc,
                ts_local,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        validate_series(instrument, &bars)?;
        Ok(bars)
    }
}

impl BarStore for CsvBarStore {
    fn bars(
        &self,
        instrument: &InstrumentId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<MinuteBar>, StoreError> {
        let mut loaded = self.loaded.lock().expect("bar store mutex poisoned");
        if !loaded.contains_key(instrument) {
            let series = self.load(instrument)?;
            loaded.insert(instrument.clone(), series);
        }
        let series = &loaded[instrument];

        let lo = series.partition_point(|b| b.ts_local < start);
        let hi = series.partition_point(|b| b.ts_local < end);
        Ok(series[lo..hi].to_vec())
    }
}
