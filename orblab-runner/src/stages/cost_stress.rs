//! Cost stress test — does the edge survive worse friction?
//!
//! The frozen test trades are re-priced through the cost book at 125%,
//! 150%, and 200% friction. Only the realized leg changes; entries, exits,
//! and theoretical R are untouched, because stress scales friction and
//! nothing else.

use anyhow::Result;
use tracing::info;

use orblab_core::costs::StressLevel;
use orblab_core::domain::{TradeOutcome, TradeResult};

use super::{metrics, StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::ExpiredPolicy;

pub struct CostStressTest;

/// Mean re-priced realized R of the trade list at a stress level.
fn stressed_expectancy(
    ctx: &StageContext<'_>,
    trades: &[TradeResult],
    stress: StressLevel,
) -> Result<Option<f64>> {
    let policy = ctx.config.expired_policy();
    let book = ctx.harness.cost_book();

    let mut total = 0.0;
    let mut n = 0usize;
    for trade in trades {
        let theoretical = match (trade.outcome, policy) {
            (TradeOutcome::Expired, ExpiredPolicy::Exclude) => continue,
            (TradeOutcome::Expired, ExpiredPolicy::CountAsLoss) => -1.0,
            _ => trade.theoretical_r,
        };
        let repriced = book.realize(&trade.instrument, trade.risk_points(), theoretical, stress)?;
        total += repriced.realized_r;
        n += 1;
    }

    Ok((n > 0).then(|| total / n as f64))
}

impl ValidationStage for CostStressTest {
    fn id(&self) -> StageId {
        StageId::CostStressTest
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let floor = ctx.config.stress.min_expectancy;
        let trades = ctx.frozen_test_trades()?.to_vec();

        let mut m = metrics([("min_expectancy", floor)]);
        let mut worst: Option<(StressLevel, f64)> = None;

        for stress in StressLevel::ALL_STRESSED {
            let expectancy = match stressed_expectancy(ctx, &trades, stress)? {
                Some(e) => e,
                None => {
                    return Ok(ValidationStageResult::fail(
                        self.id(),
                        m,
                        "no trades left to stress after expired policy".to_string(),
                    ));
                }
            };
            m.insert(stress.label().to_string(), expectancy);
            if worst.map_or(true, |(_, w)| expectancy < w) {
                worst = Some((stress, expectancy));
            }
        }

        if let Some((level, expectancy)) = worst {
            if expectancy < floor {
                return Ok(ValidationStageResult::fail(
                    self.id(),
                    m,
                    format!(
                        "expectancy {:.3} at {} below minimum {:.3}",
                        expectancy,
                        level.label(),
                        floor
                    ),
                ));
            }
            info!(
                worst_expectancy = expectancy,
                level = level.label(),
                "cost stress survived"
            );
        }
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
