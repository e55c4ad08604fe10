//! Out-of-sample verification — the primary anti-curve-fitting control.
//!
//! Re-runs the frozen configuration on the untouched test slice. Two gates,
//! both required: test expectancy above its floor, and train-to-test
//! degradation below its ceiling. This stage is never skipped or weakened;
//! a configuration that only works where it was tuned dies here.

use anyhow::Result;
use tracing::{info, warn};

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::RSummary;

pub struct OutOfSampleVerification;

/// Train-to-test degradation in percent.
///
/// Positive train expectancy is required upstream, so the ratio form is
/// well defined; a negative test expectancy degrades more than 100%.
fn degradation_pct(train: f64, test: f64) -> f64 {
    if train <= 0.0 {
        // Train never passed a positive gate: treat as fully degraded.
        return 100.0;
    }
    (train - test) / train * 100.0
}

impl ValidationStage for OutOfSampleVerification {
    fn id(&self) -> StageId {
        StageId::OutOfSampleVerification
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let thresholds = &ctx.config.oos;
        let train_expectancy = ctx
            .train_summary
            .as_ref()
            .map(|s| s.realized_expectancy)
            .ok_or_else(|| anyhow::anyhow!("optimization stage has not recorded a train summary"))?;

        let trades = ctx.harness.run_days(&ctx.candidate, &ctx.split.test)?;
        let summary = RSummary::compute(&trades, ctx.config.expired_policy());
        let degradation = degradation_pct(train_expectancy, summary.realized_expectancy);

        let m = metrics([
            ("train_expectancy", train_expectancy),
            ("test_expectancy", summary.realized_expectancy),
            ("degradation_pct", degradation),
            ("test_sample_size", summary.sample_size as f64),
            ("min_expectancy", thresholds.min_expectancy),
            ("max_degradation_pct", thresholds.max_degradation_pct),
        ]);

        // Later stages re-analyze exactly these trades.
        ctx.test_trades = Some(trades);
        ctx.test_summary = Some(summary.clone());

        if summary.realized_expectancy < thresholds.min_expectancy {
            warn!(
                test_expectancy = summary.realized_expectancy,
                "out-of-sample expectancy below floor"
            );
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "test expectancy {:.3} below minimum {:.3}",
                    summary.realized_expectancy, thresholds.min_expectancy
                ),
            ));
        }
        if degradation > thresholds.max_degradation_pct {
            warn!(degradation, "train-to-test degradation above ceiling");
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "degradation {:.1}% above maximum {:.1}%",
                    degradation, thresholds.max_degradation_pct
                ),
            ));
        }

        info!(
            test_expectancy = summary.realized_expectancy,
            degradation, "out-of-sample verification passed"
        );
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degradation_reference_case() {
        // Train +0.48R to test +0.05R is an 89.6% degradation — over a 50%
        // ceiling this must fail.
        let d = degradation_pct(0.48, 0.05);
        assert!((d - 89.58333333333333).abs() < 1e-9);
        assert!(d > 50.0);
    }

    #[test]
    fn no_degradation_when_test_matches_train() {
        assert!(degradation_pct(0.4, 0.4).abs() < 1e-12);
    }

    #[test]
    fn improvement_is_negative_degradation() {
        assert!(degradation_pct(0.3, 0.45) < 0.0);
    }

    #[test]
    fn negative_test_expectancy_exceeds_full_degradation() {
        assert!(degradation_pct(0.4, -0.2) > 100.0);
    }

    #[test]
    fn non_positive_train_is_fully_degraded() {
        assert_eq!(degradation_pct(0.0, 0.3), 100.0);
        assert_eq!(degradation_pct(-0.1, 0.3), 100.0);
    }
}
