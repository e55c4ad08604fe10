//! Regime analysis — does the edge hold across market states?
//!
//! The classifier is a pluggable policy, not core logic: historical
//! experiments disagreed on what "trending" means and no variant reached
//! robust significance, so the stage takes any [`RegimeClassifier`] and the
//! shipped classifiers are interchangeable. The gate requires the floor
//! expectancy in every regime that has enough trades to judge.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use orblab_core::domain::{DailyFeatureRow, TradeResult, WindowId};

use super::{StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::effective_r;

/// Labels a trading day's market state from its feature row.
///
/// Feature rows see only pre-window and prior-day data, so classifiers
/// cannot leak the trade's own outcome into its label.
pub trait RegimeClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the inputs the classifier needs are missing.
    fn classify(&self, row: &DailyFeatureRow, window: &WindowId) -> Option<&'static str>;
}

/// Opening-range size relative to daily ATR.
///
/// A range wider than `threshold` ATRs marks an expanded-volatility day.
pub struct AtrRatioClassifier {
    pub threshold: f64,
}

impl Default for AtrRatioClassifier {
    fn default() -> Self {
        Self { threshold: 1.5 }
    }
}

impl RegimeClassifier for AtrRatioClassifier {
    fn name(&self) -> &'static str {
        "atr_ratio"
    }

    fn classify(&self, row: &DailyFeatureRow, window: &WindowId) -> Option<&'static str> {
        let range = row.windows.get(window)?.range.as_ref()?;
        let atr = row.indicators.atr_14?;
        if atr <= 0.0 {
            return None;
        }
        Some(if range.size() / atr >= self.threshold {
            "expanded"
        } else {
            "compressed"
        })
    }
}

/// Prior-day RSI distance from neutral.
///
/// RSI at least `band` away from 50 marks a directional day.
pub struct RsiTrendClassifier {
    pub band: f64,
}

impl Default for RsiTrendClassifier {
    fn default() -> Self {
        Self { band: 10.0 }
    }
}

impl RegimeClassifier for RsiTrendClassifier {
    fn name(&self) -> &'static str {
        "rsi_trend"
    }

    fn classify(&self, row: &DailyFeatureRow, _window: &WindowId) -> Option<&'static str> {
        let rsi = row.indicators.rsi_14?;
        Some(if (rsi - 50.0).abs() >= self.band {
            "directional"
        } else {
            "balanced"
        })
    }
}

pub struct RegimeAnalysis {
    classifier: Box<dyn RegimeClassifier>,
}

impl RegimeAnalysis {
    pub fn new(classifier: Box<dyn RegimeClassifier>) -> Self {
        Self { classifier }
    }
}

impl ValidationStage for RegimeAnalysis {
    fn id(&self) -> StageId {
        StageId::RegimeAnalysis
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let thresholds = &ctx.config.regime;
        let policy = ctx.config.expired_policy();
        let trades: Vec<TradeResult> = ctx.frozen_test_trades()?.to_vec();

        // Bucket effective R by the regime label of each trade's day.
        let mut buckets: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
        let mut unlabeled = 0usize;
        for trade in &trades {
            let Some((_, realized)) = effective_r(trade, policy) else {
                continue;
            };
            match self.label_for(ctx, trade.entry_ts.date())? {
                Some(label) => buckets.entry(label).or_default().push(realized),
                None => unlabeled += 1,
            }
        }

        let mut m = BTreeMap::new();
        m.insert("unlabeled_trades".to_string(), unlabeled as f64);
        m.insert("min_expectancy".to_string(), thresholds.min_expectancy);
        m.insert(
            "min_trades_per_regime".to_string(),
            thresholds.min_trades_per_regime as f64,
        );

        let mut judged = 0usize;
        for (label, rs) in &buckets {
            let expectancy = rs.iter().sum::<f64>() / rs.len() as f64;
            m.insert(format!("{label}_trades"), rs.len() as f64);
            m.insert(format!("{label}_expectancy"), expectancy);

            if rs.len() < thresholds.min_trades_per_regime {
                continue; // reported, not gated
            }
            judged += 1;
            if expectancy < thresholds.min_expectancy {
                return Ok(ValidationStageResult::fail(
                    self.id(),
                    m,
                    format!(
                        "expectancy {:.3} in {} regime ({} trades) below minimum {:.3}",
                        expectancy,
                        label,
                        rs.len(),
                        thresholds.min_expectancy
                    ),
                ));
            }
        }

        if judged == 0 {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "no regime reached {} trades under classifier {}",
                    thresholds.min_trades_per_regime,
                    self.classifier.name()
                ),
            ));
        }

        info!(
            classifier = self.classifier.name(),
            regimes = judged, "regime analysis passed"
        );
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}

impl RegimeAnalysis {
    fn label_for(
        &self,
        ctx: &StageContext<'_>,
        date: NaiveDate,
    ) -> Result<Option<&'static str>> {
        let row = ctx.harness.feature_row(&ctx.candidate.instrument, date)?;
        Ok(row.and_then(|row| self.classifier.classify(&row, &ctx.candidate.window)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orblab_core::domain::{DailyIndicators, OpeningRange, WindowFeatures};
    use std::collections::BTreeMap as Map;

    fn row(range_size: Option<f64>, atr: Option<f64>, rsi: Option<f64>) -> DailyFeatureRow {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut windows = Map::new();
        windows.insert(
            WindowId::from("w"),
            WindowFeatures {
                range: range_size.map(|s| {
                    OpeningRange::new(date, "MES".into(), "w".into(), 100.0 + s, 100.0).unwrap()
                }),
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

    #[test]
    fn atr_ratio_splits_on_threshold() {
        let classifier = AtrRatioClassifier { threshold: 1.5 };
        let wide = row(Some(6.0), Some(3.0), None); // ratio 2.0
        let narrow = row(Some(3.0), Some(3.0), None); // ratio 1.0
        assert_eq!(classifier.classify(&wide, &"w".into()), Some("expanded"));
        assert_eq!(classifier.classify(&narrow, &"w".into()), Some("compressed"));
    }

    #[test]
    fn atr_ratio_without_inputs_is_unlabeled() {
        let classifier = AtrRatioClassifier::default();
        assert_eq!(classifier.classify(&row(None, Some(3.0), None), &"w".into()), None);
        assert_eq!(classifier.classify(&row(Some(3.0), None, None), &"w".into()), None);
    }

    #[test]
    fn rsi_trend_splits_on_band() {
        let classifier = RsiTrendClassifier { band: 10.0 };
        assert_eq!(
            classifier.classify(&row(None, None, Some(65.0)), &"w".into()),
            Some("directional")
        );
        assert_eq!(
            classifier.classify(&row(None, None, Some(53.0)), &"w".into()),
            Some("balanced")
        );
        assert_eq!(
            classifier.classify(&row(None, None, Some(35.0)), &"w".into()),
            Some("directional")
        );
    }

    #[test]
    fn classifiers_are_interchangeable() {
        let policies: Vec<Box<dyn RegimeClassifier>> = vec![
            Box::new(AtrRatioClassifier::default()),
            Box::new(RsiTrendClassifier::default()),
        ];
        let sample = row(Some(6.0), Some(3.0), Some(65.0));
        for policy in &policies {
            assert!(policy.classify(&sample, &"w".into()).is_some());
        }
    }
}
