//! Expectancy metrics — pure functions over trade lists.
//!
//! Every metric is a strategy-level aggregate recomputed from per-trade
//! inputs; nothing here is stored back onto trades. The expired-trade
//! policy is applied here and only here, so the rest of the pipeline sees
//! one consistent effective R per trade.

use serde::{Deserialize, Serialize};

use orblab_core::domain::{TradeOutcome, TradeResult};

/// How trades that neither won nor lost are counted.
///
/// Historical configurations disagreed on this, so it is an explicit
/// parameter: `CountAsLoss` books a full -1R; `Exclude` drops the trade
/// from the denominator entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiredPolicy {
    CountAsLoss,
    Exclude,
}

/// Theoretical and realized R for one trade under a policy, or `None` when
/// the trade is excluded.
pub fn effective_r(trade: &TradeResult, policy: ExpiredPolicy) -> Option<(f64, f64)> {
    match (trade.outcome, policy) {
        (TradeOutcome::Expired, ExpiredPolicy::Exclude) => None,
        (TradeOutcome::Expired, ExpiredPolicy::CountAsLoss) => Some((-1.0, -1.0)),
        _ => Some((trade.theoretical_r, trade.realized_r)),
    }
}

/// Realized R values under a policy, in trade order.
pub fn effective_realized(trades: &[TradeResult], policy: ExpiredPolicy) -> Vec<f64> {
    trades
        .iter()
        .filter_map(|t| effective_r(t, policy).map(|(_, realized)| realized))
        .collect()
}

/// Strategy-level performance summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RSummary {
    /// Trades counted after the expired policy is applied.
    pub sample_size: usize,
    pub expired_count: usize,
    pub win_rate: f64,
    pub theoretical_expectancy: f64,
    pub realized_expectancy: f64,
    pub avg_win_r: f64,
    pub avg_loss_r: f64,
    pub profit_factor: f64,
    /// Deepest drawdown of the cumulative realized-R curve, in R.
    pub max_drawdown_r: f64,
    pub max_consecutive_losses: usize,
}

impl RSummary {
    pub fn compute(trades: &[TradeResult], policy: ExpiredPolicy) -> Self {
        let expired_count = trades
            .iter()
            .filter(|t| t.outcome == TradeOutcome::Expired)
            .count();

        let effective: Vec<(f64, f64)> = trades
            .iter()
            .filter_map(|t| effective_r(t, policy))
            .collect();
        let n = effective.len();
        if n == 0 {
            return Self {
                sample_size: 0,
                expired_count,
                win_rate: 0.0,
                theoretical_expectancy: 0.0,
                realized_expectancy: 0.0,
                avg_win_r: 0.0,
                avg_loss_r: 0.0,
                profit_factor: 0.0,
                max_drawdown_r: 0.0,
                max_consecutive_losses: 0,
            };
        }

        let realized: Vec<f64> = effective.iter().map(|&(_, r)| r).collect();
        let wins: Vec<f64> = realized.iter().copied().filter(|&r| r > 0.0).collect();
        let losses: Vec<f64> = realized.iter().copied().filter(|&r| r <= 0.0).collect();

        let gross_win: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().map(|r| r.abs()).sum();

        Self {
            sample_size: n,
            expired_count,
            win_rate: wins.len() as f64 / n as f64,
            theoretical_expectancy: effective.iter().map(|&(t, _)| t).sum::<f64>() / n as f64,
            realized_expectancy: realized.iter().sum::<f64>() / n as f64,
            avg_win_r: if wins.is_empty() {
                0.0
            } else {
                gross_win / wins.len() as f64
            },
            avg_loss_r: if losses.is_empty() {
                0.0
            } else {
                losses.iter().sum::<f64>() / losses.len() as f64
            },
            profit_factor: if gross_loss > 0.0 {
                gross_win / gross_loss
            } else if gross_win > 0.0 {
                f64::INFINITY
            } else {
                0.0
            },
            max_drawdown_r: max_drawdown_r(&realized),
            max_consecutive_losses: max_consecutive_losses(&realized),
        }
    }
}

/// Cumulative sum of R values, in trade order.
pub fn cumulative_r_curve(r_values: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(r_values.len());
    let mut total = 0.0;
    for r in r_values {
        total += r;
        curve.push(total);
    }
    curve
}

/// Deepest peak-to-trough drop of the cumulative R curve.
pub fn max_drawdown_r(r_values: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    let mut total = 0.0_f64;
    for r in r_values {
        total += r;
        peak = peak.max(total);
        max_dd = max_dd.max(peak - total);
    }
    max_dd
}

fn max_consecutive_losses(r_values: &[f64]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for &r in r_values {
        if r <= 0.0 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use orblab_core::domain::Direction;

    fn trade(outcome: TradeOutcome, theoretical: f64, realized: f64) -> TradeResult {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 46, 0)
            .unwrap();
        TradeResult {
            instrument: "MES".into(),
            window: "w".into(),
            direction: Direction::Up,
            entry_ts: ts,
            entry_price: 102.5,
            stop_price: 100.0,
            target_price: 107.5,
            exit_ts: ts,
            exit_price: 107.5,
            outcome,
            theoretical_r: theoretical,
            realized_r: realized,
            mae_r: 0.2,
            mfe_r: 2.0,
        }
    }

    fn mixed_trades() -> Vec<TradeResult> {
        vec![
            trade(TradeOutcome::Win, 2.0, 1.3),
            trade(TradeOutcome::Loss, -1.0, -1.0),
            trade(TradeOutcome::Win, 2.0, 1.3),
            trade(TradeOutcome::Expired, 0.3, 0.1),
        ]
    }

    #[test]
    fn count_as_loss_books_full_loss() {
        let summary = RSummary::compute(&mixed_trades(), ExpiredPolicy::CountAsLoss);
        assert_eq!(summary.sample_size, 4);
        assert_eq!(summary.expired_count, 1);
        assert_eq!(summary.win_rate, 0.5);
        // (1.3 - 1.0 + 1.3 - 1.0) / 4
        assert!((summary.realized_expectancy - 0.15).abs() < 1e-12);
        // (2.0 - 1.0 + 2.0 - 1.0) / 4
        assert!((summary.theoretical_expectancy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn exclude_drops_the_denominator() {
        let summary = RSummary::compute(&mixed_trades(), ExpiredPolicy::Exclude);
        assert_eq!(summary.sample_size, 3);
        assert_eq!(summary.expired_count, 1);
        // (1.3 - 1.0 + 1.3) / 3
        assert!((summary.realized_expectancy - 1.6 / 3.0).abs() < 1e-12);
        assert!((summary.win_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn avg_win_and_loss() {
        let summary = RSummary::compute(&mixed_trades(), ExpiredPolicy::CountAsLoss);
        assert!((summary.avg_win_r - 1.3).abs() < 1e-12);
        assert!((summary.avg_loss_r - (-1.0)).abs() < 1e-12);
        // gross win 2.6, gross loss 2.0
        assert!((summary.profit_factor - 1.3).abs() < 1e-12);
    }

    #[test]
    fn empty_trades_are_all_zero() {
        let summary = RSummary::compute(&[], ExpiredPolicy::CountAsLoss);
        assert_eq!(summary.sample_size, 0);
        assert_eq!(summary.realized_expectancy, 0.0);
    }

    #[test]
    fn drawdown_of_win_loss_sequence() {
        // Curve: 1.3, 0.3, -0.7, 0.6 → peak 1.3, trough -0.7, drawdown 2.0.
        let rs = vec![1.3, -1.0, -1.0, 1.3];
        assert!((max_drawdown_r(&rs) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn drawdown_of_monotone_wins_is_zero() {
        let rs = vec![1.3, 1.3, 1.3];
        assert_eq!(max_drawdown_r(&rs), 0.0);
    }

    #[test]
    fn consecutive_loss_streak() {
        let rs = vec![1.0, -1.0, -1.0, -1.0, 1.0, -1.0];
        assert_eq!(max_consecutive_losses(&rs), 3);
    }

    #[test]
    fn cumulative_curve_matches_running_sum() {
        let curve = cumulative_r_curve(&[1.0, -1.0, 2.0]);
        assert_eq!(curve, vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn effective_realized_respects_policy() {
        let trades = mixed_trades();
        let counted = effective_realized(&trades, ExpiredPolicy::CountAsLoss);
        assert_eq!(counted.len(), 4);
        assert_eq!(counted[3], -1.0);
        let excluded = effective_realized(&trades, ExpiredPolicy::Exclude);
        assert_eq!(excluded.len(), 3);
    }
}
