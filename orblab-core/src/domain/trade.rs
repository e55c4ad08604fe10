//! TradeResult — the immutable outcome of one simulated trade.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::{InstrumentId, WindowId};
use super::range::Direction;

/// Terminal state of a simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    /// Target touched before stop.
    Win,
    /// Stop touched before target, or both touched within the same bar.
    Loss,
    /// Neither level touched before the scan window closed.
    Expired,
}

/// Outcome of one simulated opening-range-breakout trade.
///
/// Produced once per simulation call and never mutated afterwards. Stores
/// only per-trade inputs; strategy-level aggregates (win rate, expectancy)
/// are recomputed downstream and never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub instrument: InstrumentId,
    pub window: WindowId,
    pub direction: Direction,
    pub entry_ts: NaiveDateTime,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub exit_ts: NaiveDateTime,
    pub exit_price: f64,
    pub outcome: TradeOutcome,
    /// R-multiple before costs: +target_R on a win, -1.0 on a loss,
    /// mark-to-close on expiry.
    pub theoretical_r: f64,
    /// R-multiple with friction embedded in both legs (cost book owns the
    /// formula).
    pub realized_r: f64,
    /// Worst excursion against the broken range edge, in risk units.
    pub mae_r: f64,
    /// Best excursion beyond the broken range edge, in risk units.
    pub mfe_r: f64,
}

impl TradeResult {
    /// Risk distance in price points: entry to stop, ORB-anchored.
    pub fn risk_points(&self) -> f64 {
        (self.entry_price - self.stop_price).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn risk_points_is_entry_to_stop() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 46, 0)
            .unwrap();
        let trade = TradeResult {
            instrument: "MES".into(),
            window: "ny_0930_15m".into(),
            direction: Direction::Up,
            entry_ts: ts,
            entry_price: 102.5,
            stop_price: 100.0,
            target_price: 107.5,
            exit_ts: ts,
            exit_price: 100.0,
            outcome: TradeOutcome::Loss,
            theoretical_r: -1.0,
            realized_r: -1.0,
            mae_r: 1.0,
            mfe_r: 0.1,
        };
        assert!((trade.risk_points() - 2.5).abs() < 1e-12);
    }
}
