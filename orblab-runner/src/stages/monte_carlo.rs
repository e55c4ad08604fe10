//! Monte Carlo shuffle — is the equity path explainable by ordering luck?
//!
//! Permuting the trade sequence leaves total R invariant, so the gate is on
//! path risk: the realized ordering's max drawdown must sit inside the
//! favorable side of the shuffled drawdown distribution, and the total must
//! be positive. A strategy whose observed sequence clusters its losses
//! worse than 95% of random orderings is flagged as ordering-fragile.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::{effective_realized, max_drawdown_r};
use crate::stats::percentile_sorted;

pub struct MonteCarloShuffle;

impl ValidationStage for MonteCarloShuffle {
    fn id(&self) -> StageId {
        StageId::MonteCarlo
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let mc = &ctx.config.monte_carlo;
        let trades = ctx.frozen_test_trades()?;
        let r_values = effective_realized(trades, ctx.config.expired_policy());

        if r_values.len() < 2 {
            return Ok(ValidationStageResult::fail(
                self.id(),
                metrics([("sample_size", r_values.len() as f64)]),
                "too few trades to shuffle".to_string(),
            ));
        }

        let actual_drawdown = max_drawdown_r(&r_values);
        let total_r: f64 = r_values.iter().sum();

        let mut rng = StdRng::seed_from_u64(mc.seed);
        let mut shuffled = r_values.clone();
        let mut drawdowns = Vec::with_capacity(mc.n_shuffles);
        for _ in 0..mc.n_shuffles {
            shuffled.shuffle(&mut rng);
            drawdowns.push(max_drawdown_r(&shuffled));
        }
        drawdowns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let drawdown_ceiling = percentile_sorted(&drawdowns, mc.drawdown_percentile);

        let m = metrics([
            ("total_r", total_r),
            ("actual_drawdown_r", actual_drawdown),
            ("drawdown_ceiling_r", drawdown_ceiling),
            ("drawdown_percentile", mc.drawdown_percentile),
            ("n_shuffles", mc.n_shuffles as f64),
        ]);

        if total_r <= 0.0 {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!("total realized R {total_r:.3} is not positive"),
            ));
        }
        if actual_drawdown > drawdown_ceiling {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "observed drawdown {:.2}R beyond the {:.0}th percentile of {} shuffles ({:.2}R)",
                    actual_drawdown, mc.drawdown_percentile, mc.n_shuffles, drawdown_ceiling
                ),
            ));
        }

        info!(
            actual_drawdown,
            drawdown_ceiling, "monte carlo shuffle passed"
        );
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
