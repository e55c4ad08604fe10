//! Concept test — is the raw idea worth optimizing at all?
//!
//! Runs the candidate with its default, non-optimized parameters on the
//! validation slice. Rejecting non-viable concepts here keeps the grid
//! search from polishing noise.

use anyhow::Result;
use tracing::info;

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::RSummary;

pub struct ConceptTest;

impl ValidationStage for ConceptTest {
    fn id(&self) -> StageId {
        StageId::ConceptTest
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let thresholds = &ctx.config.concept;
        let trades = ctx.harness.run_days(&ctx.candidate, &ctx.split.validation)?;
        let summary = RSummary::compute(&trades, ctx.config.expired_policy());

        info!(
            candidate = %ctx.candidate.label(),
            sample = summary.sample_size,
            expectancy = summary.realized_expectancy,
            "concept test"
        );

        let m = metrics([
            ("sample_size", summary.sample_size as f64),
            ("realized_expectancy", summary.realized_expectancy),
            ("win_rate", summary.win_rate),
            ("min_expectancy", thresholds.min_expectancy),
            ("min_sample", thresholds.min_sample as f64),
        ]);

        if summary.sample_size < thresholds.min_sample {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "sample size {} below minimum {}",
                    summary.sample_size, thresholds.min_sample
                ),
            ));
        }
        if summary.realized_expectancy < thresholds.min_expectancy {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "realized expectancy {:.3} below minimum {:.3}",
                    summary.realized_expectancy, thresholds.min_expectancy
                ),
            ));
        }
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
