//! Promotion — construct the terminal record.
//!
//! Reached only when every prior stage passed (the pipeline halts on the
//! first failure), so this stage's job is assembly, not judgment: it turns
//! the frozen candidate and its out-of-sample summary into a
//! [`ValidatedSetup`]. The pipeline attaches the complete stage results
//! after its own result is recorded.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::setup::ValidatedSetup;

pub struct Promotion;

impl ValidationStage for Promotion {
    fn id(&self) -> StageId {
        StageId::Promotion
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let summary = ctx
            .test_summary
            .clone()
            .ok_or_else(|| anyhow::anyhow!("out-of-sample stage has not recorded a test summary"))?;

        let setup = ValidatedSetup {
            instrument: ctx.candidate.instrument.clone(),
            window: ctx.candidate.window.clone(),
            target_r: ctx.candidate.target_r,
            stop_mode: ctx.candidate.stop_mode,
            filters: ctx.candidate.filters.clone(),
            candidate_hash: ctx.candidate.full_hash(),
            win_rate: summary.win_rate,
            theoretical_expectancy: summary.theoretical_expectancy,
            realized_expectancy: summary.realized_expectancy,
            sample_size: summary.sample_size,
            avg_win_r: summary.avg_win_r,
            avg_loss_r: summary.avg_loss_r,
            stage_results: Vec::new(), // attached by the pipeline
            walkforward_validated: true,
            cost_book_version: ctx.harness.cost_book().version.clone(),
            validated_at: Utc::now().naive_utc(),
        };

        info!(candidate = %ctx.candidate.label(), "candidate promoted");

        let m = metrics([
            ("realized_expectancy", setup.realized_expectancy),
            ("win_rate", setup.win_rate),
            ("sample_size", setup.sample_size as f64),
        ]);
        ctx.setup = Some(setup);

        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
