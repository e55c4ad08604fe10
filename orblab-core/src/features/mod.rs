//! Feature aggregation — one immutable row per (date, instrument).
//!
//! Zero-lookahead is the governing rule: session statistics use only bars
//! that printed strictly before the window opens, and indicators use only
//! completed prior days. Rebuilding a date is idempotent — the same store
//! contents produce a byte-identical row, so re-runs after a backfill are
//! safe.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::domain::range::RangeError;
use crate::domain::{DailyFeatureRow, DailyIndicators, InstrumentId, OpeningRange, WindowFeatures};
use crate::indicators::{latest_atr, latest_rsi, DaySummary};
use crate::session::WindowSpec;
use crate::store::{BarStore, StoreError};

/// Tunables for feature building.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Calendar days scanned backwards when collecting prior-day summaries.
    pub history_days: usize,
    pub atr_period: usize,
    pub rsi_period: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            history_days: 45,
            atr_period: 14,
            rsi_period: 14,
        }
    }
}

/// Why a day produced no feature row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No bars at all for the date (weekend, holiday, feed gap).
    NoBars(NaiveDate),
    /// The store could not answer (missing instrument, timeout).
    StoreUnavailable,
}

/// Result of one build call.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Row(DailyFeatureRow),
    Skipped(SkipReason),
}

impl BuildOutcome {
    pub fn row(self) -> Option<DailyFeatureRow> {
        match self {
            BuildOutcome::Row(row) => Some(row),
            BuildOutcome::Skipped(_) => None,
        }
    }
}

/// Errors that abort a feature build.
///
/// Recoverable store conditions (no data, timeout) surface as
/// [`BuildOutcome::Skipped`], not as errors.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Builds daily feature rows from a bar store.
pub struct FeatureAggregator<'a> {
    store: &'a dyn BarStore,
    windows: &'a [WindowSpec],
    config: FeatureConfig,
}

impl<'a> FeatureAggregator<'a> {
    pub fn new(store: &'a dyn BarStore, windows: &'a [WindowSpec], config: FeatureConfig) -> Self {
        Self {
            store,
            windows,
            config,
        }
    }

    /// Build the feature row for one (date, instrument).
    pub fn build(
        &self,
        date: NaiveDate,
        instrument: &InstrumentId,
    ) -> Result<BuildOutcome, FeatureError> {
        let day_bars = match self.day_bars(date, instrument) {
            Ok(bars) => bars,
            Err(e) if e.is_recoverable() => {
                debug!(%instrument, %date, "store unavailable, skipping day");
                return Ok(BuildOutcome::Skipped(SkipReason::StoreUnavailable));
            }
            Err(e) => return Err(e.into()),
        };
        if day_bars.is_empty() {
            return Ok(BuildOutcome::Skipped(SkipReason::NoBars(date)));
        }

        let prior_days = self.prior_summaries(date, instrument)?;
        let prior_session = prior_days.last().copied();

        let mut windows = BTreeMap::new();
        for spec in self.windows {
            let features = self.window_features(date, instrument, spec, &day_bars, prior_session)?;
            windows.insert(spec.id.clone(), features);
        }

        let indicators = DailyIndicators {
            atr_14: latest_atr(&prior_days, self.config.atr_period),
            rsi_14: latest_rsi(&prior_days, self.config.rsi_period),
        };

        Ok(BuildOutcome::Row(DailyFeatureRow {
            date,
            instrument: instrument.clone(),
            windows,
            indicators,
        }))
    }

    fn day_bars(
        &self,
        date: NaiveDate,
        instrument: &InstrumentId,
    ) -> Result<Vec<crate::domain::MinuteBar>, StoreError> {
        let start = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let end = date.succ_opt().expect("calendar overflow").and_hms_opt(0, 0, 0).expect("midnight is valid");
        self.store.bars(instrument, start, end)
    }

    /// Prior-day OHLC summaries, oldest first, ending with the most recent
    /// completed day strictly before `date`.
    fn prior_summaries(
        &self,
        date: NaiveDate,
        instrument: &InstrumentId,
    ) -> Result<Vec<DaySummary>, FeatureError> {
        let mut summaries = Vec::new();
        let mut day = date;
        for _ in 0..self.config.history_days {
            day = day.pred_opt().expect("calendar underflow");
            let bars = match self.day_bars(day, instrument) {
                Ok(bars) => bars,
                Err(e) if e.is_recoverable() => continue,
                Err(e) => return Err(e.into()),
            };
            if bars.is_empty() {
                continue;
            }
            summaries.push(DaySummary {
                date: day,
                open: bars[0].open,
                high: bars.iter().map(|b| b.high).fold(f64::MIN, f64::max),
                low: bars.iter().map(|b| b.low).fold(f64::MAX, f64::min),
                close: bars[bars.len() - 1].close,
            });
        }
        summaries.reverse();
        Ok(summaries)
    }

    fn window_features(
        &self,
        date: NaiveDate,
        instrument: &InstrumentId,
        spec: &WindowSpec,
        day_bars: &[crate::domain::MinuteBar],
        prior_session: Option<DaySummary>,
    ) -> Result<WindowFeatures, FeatureError> {
        let (range_start, range_end) = spec.range_bounds(date);

        let range_bars: Vec<_> = day_bars
            .iter()
            .filter(|b| b.ts_local >= range_start && b.ts_local < range_end)
            .collect();

        let range = if range_bars.is_empty() {
            None
        } else {
            let high = range_bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = range_bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            Some(OpeningRange::new(
                date,
                instrument.clone(),
                spec.id.clone(),
                high,
                low,
            )?)
        };

        // Everything below uses only bars strictly before the window open.
        let pre_window: Vec<_> = day_bars
            .iter()
            .filter(|b| b.ts_local < range_start)
            .collect();

        let pre_window_travel = if pre_window.is_empty() {
            None
        } else {
            let high = pre_window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = pre_window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            Some(high - low)
        };

        let overnight_gap = match (pre_window.first(), prior_session) {
            (Some(first), Some(prior)) => Some(first.open - prior.close),
            _ => None,
        };

        Ok(WindowFeatures {
            range,
            pre_window_travel,
            prior_session_high: prior_session.map(|p| p.high),
            prior_session_low: prior_session.map(|p| p.low),
            overnight_gap,
        })
    }
}

/// Keyed upsert store for feature rows.
///
/// Overwrites are deterministic: rebuilding a key from the same inputs
/// replaces the row with an identical one.
#[derive(Debug, Default)]
pub struct FeatureCache {
    rows: BTreeMap<(NaiveDate, InstrumentId), DailyFeatureRow>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the replaced row if one existed.
    pub fn upsert(&mut self, row: DailyFeatureRow) -> Option<DailyFeatureRow> {
        self.rows
            .insert((row.date, row.instrument.clone()), row)
    }

    pub fn get(&self, date: NaiveDate, instrument: &InstrumentId) -> Option<&DailyFeatureRow> {
        self.rows.get(&(date, instrument.clone()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WindowId;
    use crate::store::MemoryBarStore;
    use chrono::{Duration, NaiveTime, TimeZone, Utc};

    fn bar(date: NaiveDate, hour: u32, minute: u32, o: f64, h: f64, l: f64, c: f64) -> crate::domain::MinuteBar {
        let local = date.and_hms_opt(hour, minute, 0).unwrap();
        crate::domain::MinuteBar {
            instrument: "MES".into(),
            ts_utc: Utc.from_utc_datetime(&(local + Duration::hours(5))),
            ts_local: local,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100,
        }
    }

    fn windows() -> Vec<WindowSpec> {
        vec![WindowSpec {
            id: "w".into(),
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            open_minutes: 2,
            scan_until: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }]
    }

    fn store_with_two_days() -> MemoryBarStore {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut bars = vec![
            // Prior session.
            bar(d1, 9, 30, 99.0, 103.0, 98.5, 102.0),
            bar(d1, 9, 31, 102.0, 102.5, 101.0, 101.5),
            // Current day: pre-window, then the opening range.
            bar(d2, 9, 0, 101.0, 101.5, 100.0, 100.5),
            bar(d2, 9, 30, 100.5, 102.0, 100.25, 101.0),
            bar(d2, 9, 31, 101.0, 101.75, 100.0, 100.5),
            // After the window opens: must not affect pre-window stats.
            bar(d2, 9, 40, 100.5, 120.0, 100.5, 119.0),
        ];
        bars.sort_by_key(|b| b.ts_utc);
        let mut store = MemoryBarStore::new();
        store.insert("MES".into(), bars).unwrap();
        store
    }

    #[test]
    fn builds_range_and_session_stats() {
        let store = store_with_two_days();
        let windows = windows();
        let agg = FeatureAggregator::new(&store, &windows, FeatureConfig::default());
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let row = agg.build(date, &"MES".into()).unwrap().row().unwrap();
        let w = &row.windows[&WindowId::from("w")];
        let range = w.range.as_ref().unwrap();
        assert_eq!(range.high(), 102.0);
        assert_eq!(range.low(), 100.0);
        assert_eq!(w.prior_session_high, Some(103.0));
        assert_eq!(w.prior_session_low, Some(98.5));
        // 09:00 bar only: travel 101.5 - 100.0.
        assert_eq!(w.pre_window_travel, Some(1.5));
        // First pre-window open 101.0 minus prior close 101.5.
        assert_eq!(w.overnight_gap, Some(-0.5));
    }

    #[test]
    fn post_open_bars_do_not_leak_into_session_stats() {
        // The 09:40 bar spikes to 120 but opens after the window; pre-window
        // travel must not see it.
        let store = store_with_two_days();
        let windows = windows();
        let agg = FeatureAggregator::new(&store, &windows, FeatureConfig::default());
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let row = agg.build(date, &"MES".into()).unwrap().row().unwrap();
        let w = &row.windows[&WindowId::from("w")];
        assert!(w.pre_window_travel.unwrap() < 2.0);
    }

    #[test]
    fn empty_day_is_skipped() {
        let store = store_with_two_days();
        let windows = windows();
        let agg = FeatureAggregator::new(&store, &windows, FeatureConfig::default());
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        match agg.build(sunday, &"MES".into()).unwrap() {
            BuildOutcome::Skipped(SkipReason::NoBars(d)) => assert_eq!(d, sunday),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn unknown_instrument_is_skipped_not_fatal() {
        let store = store_with_two_days();
        let windows = windows();
        let agg = FeatureAggregator::new(&store, &windows, FeatureConfig::default());
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        match agg.build(date, &"M6E".into()).unwrap() {
            BuildOutcome::Skipped(SkipReason::StoreUnavailable) => {}
            other => panic!("expected store-unavailable skip, got {other:?}"),
        }
    }

    #[test]
    fn rebuild_is_idempotent() {
        let store = store_with_two_days();
        let windows = windows();
        let agg = FeatureAggregator::new(&store, &windows, FeatureConfig::default());
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let first = agg.build(date, &"MES".into()).unwrap().row().unwrap();
        let second = agg.build(date, &"MES".into()).unwrap().row().unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn cache_upsert_overwrites_in_place() {
        let store = store_with_two_days();
        let windows = windows();
        let agg = FeatureAggregator::new(&store, &windows, FeatureConfig::default());
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let row = agg.build(date, &"MES".into()).unwrap().row().unwrap();

        let mut cache = FeatureCache::new();
        assert!(cache.upsert(row.clone()).is_none());
        let replaced = cache.upsert(row.clone()).unwrap();
        assert_eq!(replaced.fingerprint(), row.fingerprint());
        assert_eq!(cache.len(), 1);
    }
}
