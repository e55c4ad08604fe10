//! Rolling window — does the frozen edge repeat across history?
//!
//! The full day span is cut into contiguous historical windows; inside
//! each, the chronological split is repeated and the frozen configuration
//! is evaluated on that window's own test slice. The gate is a majority
//! vote: the candidate must be profitable in at least the configured
//! fraction of windows.

use anyhow::Result;
use tracing::info;

use super::{StageContext, StageId, ValidationStage, ValidationStageResult};
use crate::expectancy::RSummary;
use crate::split::{chronological_split, rolling_windows};

pub struct RollingWindow;

impl ValidationStage for RollingWindow {
    fn id(&self) -> StageId {
        StageId::RollingWindow
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult> {
        let cfg = &ctx.config.rolling;
        let windows = match rolling_windows(&ctx.all_days, cfg.n_windows, cfg.min_days_per_window)
        {
            Ok(windows) => windows,
            Err(e) => {
                return Ok(ValidationStageResult::fail(
                    self.id(),
                    super::metrics([("n_windows", cfg.n_windows as f64)]),
                    format!("cannot form rolling windows: {e}"),
                ));
            }
        };

        let mut m = std::collections::BTreeMap::new();
        let mut profitable = 0usize;
        for (i, window_days) in windows.iter().enumerate() {
            let split = chronological_split(window_days, &ctx.config.split)
                .map_err(|e| anyhow::anyhow!("window {i} split failed: {e}"))?;
            let trades = ctx.harness.run_days(&ctx.candidate, &split.test)?;
            let summary = RSummary::compute(&trades, ctx.config.expired_policy());

            m.insert(format!("window_{i}_expectancy"), summary.realized_expectancy);
            m.insert(format!("window_{i}_trades"), summary.sample_size as f64);
            if summary.sample_size > 0 && summary.realized_expectancy > 0.0 {
                profitable += 1;
            }
        }

        let fraction = profitable as f64 / windows.len() as f64;
        m.insert("profitable_windows".to_string(), profitable as f64);
        m.insert("total_windows".to_string(), windows.len() as f64);
        m.insert("profitable_fraction".to_string(), fraction);
        m.insert(
            "min_profitable_fraction".to_string(),
            cfg.min_profitable_fraction,
        );

        if fraction < cfg.min_profitable_fraction {
            return Ok(ValidationStageResult::fail(
                self.id(),
                m,
                format!(
                    "profitable in {profitable}/{} windows ({:.0}%), needed {:.0}%",
                    windows.len(),
                    fraction * 100.0,
                    cfg.min_profitable_fraction * 100.0
                ),
            ));
        }

        info!(profitable, total = windows.len(), "rolling window passed");
        Ok(ValidationStageResult::pass(self.id(), m))
    }
}
