//! Simulation harness — one candidate, one day, one trade.
//!
//! Glues the feature aggregator, session windows, cost book, and execution
//! simulator together so pipeline stages can ask a single question: what
//! did this candidate do on these days? Recoverable store conditions
//! surface as skipped days, never as pipeline failures.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use orblab_core::costs::{CostBook, CostError};
use orblab_core::domain::{StrategyCandidate, TradeResult, WindowId};
use orblab_core::features::{BuildOutcome, FeatureAggregator, FeatureConfig, FeatureError};
use orblab_core::session::{find_window, WindowSpec};
use orblab_core::sim::{simulate, SimError, SimParams};
use orblab_core::store::BarStore;

/// Errors that abort a harness run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no window spec configured for {0}")]
    UnknownWindow(WindowId),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error("bar store error: {0}")]
    Store(#[from] orblab_core::store::StoreError),
}

/// Shared, read-only context for running candidates over days.
pub struct SimHarness<'a> {
    store: &'a dyn BarStore,
    windows: &'a [WindowSpec],
    cost_book: &'a CostBook,
    feature_config: FeatureConfig,
    entry_slippage: f64,
}

impl<'a> SimHarness<'a> {
    pub fn new(
        store: &'a dyn BarStore,
        windows: &'a [WindowSpec],
        cost_book: &'a CostBook,
        feature_config: FeatureConfig,
        entry_slippage: f64,
    ) -> Self {
        Self {
            store,
            windows,
            cost_book,
            feature_config,
            entry_slippage,
        }
    }

    pub fn cost_book(&self) -> &CostBook {
        self.cost_book
    }

    /// The feature row for one day, or `None` when the day is skipped.
    pub fn feature_row(
        &self,
        instrument: &orblab_core::domain::InstrumentId,
        date: NaiveDate,
    ) -> Result<Option<orblab_core::domain::DailyFeatureRow>, RunError> {
        let aggregator = FeatureAggregator::new(self.store, self.windows, self.feature_config.clone());
        Ok(aggregator.build(date, instrument)?.row())
    }

    /// Simulate one candidate on one day.
    ///
    /// `Ok(None)` covers all the quiet outcomes: skipped day, filtered day,
    /// missing range, no break before scan end.
    pub fn simulate_day(
        &self,
        candidate: &StrategyCandidate,
        date: NaiveDate,
    ) -> Result<Option<TradeResult>, RunError> {
        let spec = find_window(self.windows, &candidate.window)
            .ok_or_else(|| RunError::UnknownWindow(candidate.window.clone()))?;

        let aggregator = FeatureAggregator::new(self.store, self.windows, self.feature_config.clone());
        let row = match aggregator.build(date, &candidate.instrument)? {
            BuildOutcome::Row(row) => row,
            BuildOutcome::Skipped(reason) => {
                debug!(?reason, %date, "day skipped");
                return Ok(None);
            }
        };

        if !candidate.admits(&row) {
            return Ok(None);
        }

        let range = match row
            .windows
            .get(&candidate.window)
            .and_then(|w| w.range.clone())
        {
            Some(range) => range,
            None => return Ok(None),
        };

        let (scan_start, scan_end) = spec.scan_bounds(date);
        let bars = match self.store.bars(&candidate.instrument, scan_start, scan_end) {
            Ok(bars) => bars,
            Err(e) if e.is_recoverable() => {
                debug!(%date, "scan bars unavailable, skipping day");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let params = SimParams {
            stop_mode: candidate.stop_mode,
            target_r: candidate.target_r,
            entry_slippage: self.entry_slippage,
            tick_size: self.cost_book.spec(&candidate.instrument)?.tick_size,
            scan_end,
        };

        Ok(simulate(&range, &bars, &params, self.cost_book)?)
    }

    /// Simulate a candidate across a day list, collecting the trades that
    /// actually triggered, in chronological order.
    pub fn run_days(
        &self,
        candidate: &StrategyCandidate,
        days: &[NaiveDate],
    ) -> Result<Vec<TradeResult>, RunError> {
        let mut trades = Vec::new();
        for &date in days {
            if let Some(trade) = self.simulate_day(candidate, date)? {
                trades.push(trade);
            }
        }
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use orblab_core::domain::{StopMode, TradeOutcome};

    #[test]
    fn runs_scripted_win_days() {
        let fixture = testdata::Fixture::trending(6);
        let harness = fixture.harness();
        let candidate = testdata::candidate(2.0, StopMode::Full);

        let trades = harness.run_days(&candidate, &fixture.days).unwrap();
        assert_eq!(trades.len(), 6);
        assert!(trades.iter().all(|t| t.outcome == TradeOutcome::Win));
    }

    #[test]
    fn weekend_days_are_quietly_skipped() {
        let fixture = testdata::Fixture::trending(3);
        let harness = fixture.harness();
        let candidate = testdata::candidate(2.0, StopMode::Full);

        let mut days = fixture.days.clone();
        days.push(fixture.days.last().unwrap().succ_opt().unwrap() + chrono::Duration::days(30));
        let trades = harness.run_days(&candidate, &days).unwrap();
        assert_eq!(trades.len(), 3);
    }

    #[test]
    fn unknown_window_is_an_error() {
        let fixture = testdata::Fixture::trending(2);
        let harness = fixture.harness();
        let mut candidate = testdata::candidate(2.0, StopMode::Full);
        candidate.window = "missing".into();

        let err = harness
            .simulate_day(&candidate, fixture.days[0])
            .unwrap_err();
        assert!(matches!(err, RunError::UnknownWindow(_)));
    }
}
