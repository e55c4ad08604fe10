//! In-memory bar store for tests and synthetic data.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::{validate_series, BarStore, StoreError};
use crate::domain::{InstrumentId, MinuteBar};

/// Bar store backed by a map of pre-sorted series.
///
/// `insert` validates the series once; queries then binary-search the
/// local-time range.
#[derive(Debug, Default)]
pub struct MemoryBarStore {
    series: HashMap<InstrumentId, Vec<MinuteBar>>,
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a full series for an instrument, replacing any existing one.
    pub fn insert(
        &mut self,
        instrument: InstrumentId,
        bars: Vec<MinuteBar>,
    ) -> Result<(), StoreError> {
        validate_series(&instrument, &bars)?;
        self.series.insert(instrument, bars);
        Ok(())
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.series.keys()
    }
}

impl BarStore for MemoryBarStore {
    fn bars(
        &self,
        instrument: &InstrumentId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<MinuteBar>, StoreError> {
        let series = self
            .series
            .get(instrument)
            .ok_or_else(|| StoreError::NoData(instrument.clone()))?;

        let lo = series.partition_point(|b| b.ts_local < start);
        let hi = series.partition_point(|b| b.ts_local < end);
        Ok(series[lo..hi].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn bar(hour: u32, minute: u32, close: f64) -> MinuteBar {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        MinuteBar {
            instrument: "MES".into(),
            ts_utc: Utc
                .with_ymd_and_hms(2024, 3, 5, hour + 5, minute, 0)
                .unwrap(),
            ts_local: date.and_hms_opt(hour, minute, 0).unwrap(),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 100,
        }
    }

    #[test]
    fn range_query_is_half_open() {
        let mut store = MemoryBarStore::new();
        store
            .insert("MES".into(), vec![bar(9, 30, 100.0), bar(9, 31, 101.0), bar(9, 32, 102.0)])
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let got = store
            .bars(
                &"MES".into(),
                date.and_hms_opt(9, 30, 0).unwrap(),
                date.and_hms_opt(9, 32, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].close, 101.0);
    }

    #[test]
    fn unknown_instrument_is_no_data() {
        let store = MemoryBarStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let err = store
            .bars(
                &"MES".into(),
                date.and_hms_opt(9, 30, 0).unwrap(),
                date.and_hms_opt(9, 45, 0).unwrap(),
            )
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn duplicate_timestamp_rejected_on_insert() {
        let mut store = MemoryBarStore::new();
        let err = store
            .insert("MES".into(), vec![bar(9, 30, 100.0), bar(9, 30, 100.5)])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTimestamp { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn out_of_order_rejected_on_insert() {
        let mut store = MemoryBarStore::new();
        let err = store
            .insert("MES".into(), vec![bar(9, 31, 100.0), bar(9, 30, 100.5)])
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { .. }));
    }

    #[test]
    fn insane_bar_rejected_on_insert() {
        let mut store = MemoryBarStore::new();
        let mut broken = bar(9, 30, 100.0);
        broken.high = broken.low - 1.0;
        let err = store.insert("MES".into(), vec![broken]).unwrap_err();
        assert!(matches!(err, StoreError::InsaneBar { .. }));
    }
}
