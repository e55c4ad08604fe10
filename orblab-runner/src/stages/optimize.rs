//! Parameter optimization — grid search on the training slice only.
//!
//! The best configuration is frozen here; no stage after this one may tune
//! anything. Selection is deterministic so a re-run reproduces the same
//! winner from the same data.

use anyhow::Result;
use tracing::info;

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::RSummary;
use crate::grid::{search_grid, select_best, GridCheckpoint};

pub struct ParameterOptimization;

impl ValidationStage for ParameterOptimization {
    fn id(&self) -> StageId {
        StageId::ParameterOptimization
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let opt = &ctx.config.optimization;
        let cells = opt.grid.candidates(&ctx.candidate);
        let grid_size = cells.len();
        let policy = ctx.config.expired_policy();

        let harness = ctx.harness;
        let train_days = ctx.split.train.clone();
        let checkpoint = opt.checkpoint_path.as_ref().map(GridCheckpoint::new);

        let results = search_grid(
            cells,
            |candidate| {
                let trades = harness.run_days(candidate, &train_days)?;
                Ok(RSummary::compute(&trades, policy))
            },
            checkpoint.as_ref(),
            None,
            opt.chunk_size,
        )?;

        let best = match select_best(&results, opt.min_sample) {
            Some(best) => best.clone(),
            None => {
                return Ok(ValidationStageResult::fail(
                    self.id(),
                    metrics([
                        ("grid_size", grid_size as f64),
                        ("min_sample", opt.min_sample as f64),
                    ]),
                    format!(
                        "no grid cell reached {} training trades",
                        opt.min_sample
                    ),
                ));
            }
        };

        info!(
            best = %best.candidate.label(),
            in_sample_expectancy = best.summary.realized_expectancy,
            "parameter optimization froze configuration"
        );

        let m = metrics([
            ("grid_size", grid_size as f64),
            ("in_sample_expectancy", best.summary.realized_expectancy),
            ("in_sample_sample_size", best.summary.sample_size as f64),
            ("in_sample_win_rate", best.summary.win_rate),
        ]);

        ctx.candidate = best.candidate;
        ctx.train_summary = Some(best.summary);

        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
