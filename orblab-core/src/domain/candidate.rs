//! StrategyCandidate — one opening-range-breakout rule under test.

use serde::{Deserialize, Serialize};

use super::features::DailyFeatureRow;
use super::ids::{InstrumentId, WindowId};
use super::range::StopMode;

/// Optional gate on whether a day's break is taken at all.
///
/// Filters read only the day's feature row, which is built from data
/// available before the window opens, so they cannot introduce lookahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryFilter {
    /// Require the opening range to span at least `min_ratio` of the daily
    /// ATR. Thin ranges produce stops too tight to survive friction.
    MinRangeAtr { min_ratio: f64 },
    /// Require the prior-day RSI to sit inside [min, max].
    RsiBand { min: f64, max: f64 },
}

impl EntryFilter {
    /// Whether this filter admits the day for the given window.
    ///
    /// A filter whose inputs are unavailable (missing indicator, missing
    /// range) rejects the day: absence of evidence is not admission.
    pub fn allows(&self, row: &DailyFeatureRow, window: &WindowId) -> bool {
        match self {
            EntryFilter::MinRangeAtr { min_ratio } => {
                let range = row.windows.get(window).and_then(|w| w.range.as_ref());
                match (range, row.indicators.atr_14) {
                    (Some(range), Some(atr)) if atr > 0.0 => range.size() / atr >= *min_ratio,
                    _ => false,
                }
            }
            EntryFilter::RsiBand { min, max } => match row.indicators.rsi_14 {
                Some(rsi) => rsi >= *min && rsi <= *max,
                None => false,
            },
        }
    }

    pub fn label(&self) -> String {
        match self {
            EntryFilter::MinRangeAtr { min_ratio } => format!("range_atr>={min_ratio:.2}"),
            EntryFilter::RsiBand { min, max } => format!("rsi[{min:.0},{max:.0}]"),
        }
    }
}

/// One rule under test: instrument, window, reward target, stop placement,
/// and optional entry filters. Immutable for the duration of a validation
/// run; the optimizer produces new candidates rather than mutating one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCandidate {
    pub instrument: InstrumentId,
    pub window: WindowId,
    pub target_r: f64,
    pub stop_mode: StopMode,
    pub filters: Vec<EntryFilter>,
}

impl StrategyCandidate {
    /// Whether every filter admits the day.
    pub fn admits(&self, row: &DailyFeatureRow) -> bool {
        self.filters.iter().all(|f| f.allows(row, &self.window))
    }

    /// Exact identity: blake3 over canonical JSON of all fields.
    ///
    /// Two candidates differing only in a filter parameter hash differently;
    /// used to deduplicate grid checkpoints and setup records.
    pub fn full_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("StrategyCandidate must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Compact human-readable label for logs and reports.
    pub fn label(&self) -> String {
        let filters = if self.filters.is_empty() {
            "none".to_string()
        } else {
            self.filters
                .iter()
                .map(|f| f.label())
                .collect::<Vec<_>>()
                .join("+")
        };
        format!(
            "{}/{} r={:.1} stop={} filters={}",
            self.instrument,
            self.window,
            self.target_r,
            self.stop_mode.label(),
            filters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{DailyIndicators, WindowFeatures};
    use crate::domain::range::OpeningRange;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn row_with(atr: Option<f64>, rsi: Option<f64>, range_size: f64) -> DailyFeatureRow {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut windows = BTreeMap::new();
        windows.insert(
            WindowId::from("w"),
            WindowFeatures {
                range: Some(
                    OpeningRange::new(date, "MES".into(), "w".into(), 100.0 + range_size, 100.0)
                        .unwrap(),
                ),
                pre_window_travel: None,
                prior_session_high: None,
                prior_session_low: None,
                overnight_gap: None,
            },
        );
        DailyFeatureRow {
            date,
            instrument: "MES".into(),
            windows,
            indicators: DailyIndicators {
                atr_14: atr,
                rsi_14: rsi,
            },
        }
    }

    fn candidate(filters: Vec<EntryFilter>) -> StrategyCandidate {
        StrategyCandidate {
            instrument: "MES".into(),
            window: "w".into(),
            target_r: 2.0,
            stop_mode: StopMode::Full,
            filters,
        }
    }

    #[test]
    fn min_range_atr_filter() {
        let filter = EntryFilter::MinRangeAtr { min_ratio: 0.5 };
        // range 2.0, atr 3.0 → ratio 0.667 >= 0.5
        assert!(filter.allows(&row_with(Some(3.0), None, 2.0), &"w".into()));
        // range 1.0, atr 3.0 → ratio 0.333 < 0.5
        assert!(!filter.allows(&row_with(Some(3.0), None, 1.0), &"w".into()));
    }

    #[test]
    fn missing_indicator_rejects() {
        let filter = EntryFilter::MinRangeAtr { min_ratio: 0.5 };
        assert!(!filter.allows(&row_with(None, None, 2.0), &"w".into()));

        let rsi = EntryFilter::RsiBand {
            min: 40.0,
            max: 60.0,
        };
        assert!(!rsi.allows(&row_with(None, None, 2.0), &"w".into()));
    }

    #[test]
    fn rsi_band_filter() {
        let filter = EntryFilter::RsiBand {
            min: 40.0,
            max: 60.0,
        };
        assert!(filter.allows(&row_with(None, Some(50.0), 2.0), &"w".into()));
        assert!(!filter.allows(&row_with(None, Some(72.0), 2.0), &"w".into()));
    }

    #[test]
    fn candidate_admits_requires_all_filters() {
        let cand = candidate(vec![
            EntryFilter::MinRangeAtr { min_ratio: 0.5 },
            EntryFilter::RsiBand {
                min: 40.0,
                max: 60.0,
            },
        ]);
        assert!(cand.admits(&row_with(Some(3.0), Some(50.0), 2.0)));
        assert!(!cand.admits(&row_with(Some(3.0), Some(72.0), 2.0)));
    }

    #[test]
    fn unfiltered_candidate_admits_everything() {
        let cand = candidate(vec![]);
        assert!(cand.admits(&row_with(None, None, 2.0)));
    }

    #[test]
    fn full_hash_distinguishes_parameters() {
        let a = candidate(vec![]);
        let mut b = candidate(vec![]);
        b.target_r = 3.0;
        assert_ne!(a.full_hash(), b.full_hash());
        assert_eq!(a.full_hash(), candidate(vec![]).full_hash());
    }
}
