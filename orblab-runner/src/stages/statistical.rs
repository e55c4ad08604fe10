//! Statistical validation — is the mean R distinguishable from zero?
//!
//! Three gates, all required: minimum sample size, a two-sided t-test on
//! per-trade R with p below alpha, and a seeded bootstrap confidence
//! interval for the mean that sits strictly above zero. The t-test and the
//! bootstrap must agree; either alone is too easy to fool.

use anyhow::Result;
use tracing::info;

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::effective_realized;
use crate::stats::{bootstrap_mean_ci, mean_t_test};

pub struct StatisticalValidation;

impl ValidationStage for StatisticalValidation {
    fn id(&self) -> StageId {
        StageId::StatisticalValidation
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let thresholds = &ctx.config.statistical;
        let trades = ctx.frozen_test_trades()?;
        let r_values = effective_realized(trades, ctx.config.expired_policy());

        if r_values.len() < thresholds.min_sample {
            return Ok(ValidationStageResult::fail(
                self.id(),
                metrics([
                    ("sample_size", r_values.len() as f64),
                    ("min_sample", thresholds.min_sample as f64),
                ]),
                format!(
                    "sample size {} below minimum {}",
                    r_values.len(),
                    thresholds.min_sample
                ),
            ));
        }

        let t_test = mean_t_test(&r_values)
            .ok_or_else(|| anyhow::anyhow!("t-test undefined for {} values", r_values.len()))?;
        let ci = bootstrap_mean_ci(
            &r_values,
            thresholds.bootstrap_resamples,
            thresholds.bootstrap_confidence,
            thresholds.seed,
        )
        .ok_or_else(|| anyhow::anyhow!("bootstrap undefined for {} values", r_values.len()))?;

        let m = metrics([
            ("sample_size", r_values.len() as f64),
            ("mean_r", t_test.mean),
            ("t_statistic", t_test.t_statistic),
            ("p_value", t_test.p_value),
            ("alpha", thresholds.alpha),
            ("ci_lower", ci.lower),
            ("ci_upper", ci.upper),
        ]);

        if t_test.p_value >= thresholds.alpha || t_test.mean <= 0.0 {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "mean R {:.3} not significantly positive (p = {:.4}, alpha = {:.2})",
                    t_test.mean, t_test.p_value, thresholds.alpha
                ),
            ));
        }
        if !ci.excludes_zero_from_below() {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "bootstrap CI [{:.3}, {:.3}] does not exclude zero",
                    ci.lower, ci.upper
                ),
            ));
        }

        info!(
            p_value = t_test.p_value,
            ci_lower = ci.lower,
            "statistical validation passed"
        );
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
