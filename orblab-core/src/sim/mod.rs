//! Execution simulator — replay bars after an opening range to a trade outcome.
//!
//! State machine per trade: awaiting break → in trade → closed.
//!
//! Rules that carry the semantics:
//! - A break is a bar *close* strictly beyond the boundary by at least one
//!   tick. A bar that merely touches, or closes exactly on the boundary,
//!   never enters.
//! - Stop and target are anchored to the opening-range boundaries; risk is
//!   entry-to-stop with the stop placed inside the range, never measured
//!   from a floating entry.
//! - Both levels touched within one bar resolve as a loss — fill order
//!   inside a bar is unknowable from OHLC.
//! - The scan ends at an absolute datetime; a bar past it means expiry.
//! - Excursions are tracked against the broken range edge, in risk units.
//! - The cost-embedded R delegates to the cost book; the formula is not
//!   restated here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::costs::{CostBook, CostError, StressLevel};
use crate::domain::{Direction, MinuteBar, OpeningRange, StopMode, TradeOutcome, TradeResult};

/// Parameters for one simulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    pub stop_mode: StopMode,
    pub target_r: f64,
    /// Entry slippage in price points, applied in the break direction.
    pub entry_slippage: f64,
    /// Minimum close-beyond-boundary distance for a valid break.
    pub tick_size: f64,
    /// Absolute end of the trade scan (exclusive).
    pub scan_end: NaiveDateTime,
}

/// Errors from a simulation call.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("target ratio must be positive, got {0}")]
    InvalidTarget(f64),
    #[error("tick size must be positive, got {0}")]
    InvalidTick(f64),
    #[error(transparent)]
    Cost(#[from] CostError),
}

/// Detect the first valid break in the bar sequence.
///
/// Returns the index of the triggering bar and the direction. The guard is
/// explicit: a close inside the range or exactly on a boundary — however far
/// the wicks reached — keeps the state machine awaiting.
fn detect_break(
    range: &OpeningRange,
    bars: &[MinuteBar],
    tick_size: f64,
    scan_end: NaiveDateTime,
) -> Option<(usize, Direction)> {
    for (i, bar) in bars.iter().enumerate() {
        if bar.ts_local >= scan_end {
            return None;
        }
        if bar.close >= range.high() + tick_size {
            return Some((i, Direction::Up));
        }
        if bar.close <= range.low() - tick_size {
            return Some((i, Direction::Down));
        }
        // Touch without a qualifying close: still awaiting.
    }
    None
}

/// Simulate one opening-range-breakout trade.
///
/// `bars` must start at the end of range formation and run in time order.
/// Returns `Ok(None)` when no valid break occurs inside the scan window.
pub fn simulate(
    range: &OpeningRange,
    bars: &[MinuteBar],
    params: &SimParams,
    cost_book: &CostBook,
) -> Result<Option<TradeResult>, SimError> {
    if params.target_r <= 0.0 || !params.target_r.is_finite() {
        return Err(SimError::InvalidTarget(params.target_r));
    }
    if params.tick_size <= 0.0 || !params.tick_size.is_finite() {
        return Err(SimError::InvalidTick(params.tick_size));
    }

    let (trigger_idx, direction) = match detect_break(range, bars, params.tick_size, params.scan_end)
    {
        Some(found) => found,
        None => return Ok(None),
    };

    let trigger = &bars[trigger_idx];
    let entry_price = trigger.close + direction.sign() * params.entry_slippage;
    let stop_price = range.stop_price(direction, params.stop_mode);
    let risk_points = (entry_price - stop_price) * direction.sign();
    debug_assert!(risk_points > 0.0, "entry must sit beyond the stop");
    let target_price = entry_price + direction.sign() * risk_points * params.target_r;
    let edge = range.broken_edge(direction);

    let mut mae_points: f64 = 0.0;
    let mut mfe_points: f64 = 0.0;
    let mut last_in_window = trigger;

    let mut resolution: Option<(TradeOutcome, f64, NaiveDateTime)> = None;
    for bar in &bars[trigger_idx + 1..] {
        if bar.ts_local >= params.scan_end {
            break;
        }
        last_in_window = bar;

        match direction {
            Direction::Up => {
                mfe_points = mfe_points.max(bar.high - edge);
                mae_points = mae_points.max(edge - bar.low);
            }
            Direction::Down => {
                mfe_points = mfe_points.max(edge - bar.low);
                mae_points = mae_points.max(bar.high - edge);
            }
        }

        let hit_stop = match direction {
            Direction::Up => bar.low <= stop_price,
            Direction::Down => bar.high >= stop_price,
        };
        let hit_target = match direction {
            Direction::Up => bar.high >= target_price,
            Direction::Down => bar.low <= target_price,
        };

        // Both inside one bar: conservative loss.
        if hit_stop {
            resolution = Some((TradeOutcome::Loss, stop_price, bar.ts_local));
            break;
        }
        if hit_target {
            resolution = Some((TradeOutcome::Win, target_price, bar.ts_local));
            break;
        }
    }

    let (outcome, exit_price, exit_ts) = resolution.unwrap_or((
        TradeOutcome::Expired,
        last_in_window.close,
        last_in_window.ts_local,
    ));

    let theoretical_r = match outcome {
        TradeOutcome::Win => params.target_r,
        TradeOutcome::Loss => -1.0,
        TradeOutcome::Expired => (exit_price - entry_price) * direction.sign() / risk_points,
    };

    let realized = cost_book.realize(
        range.instrument(),
        risk_points,
        theoretical_r,
        StressLevel::Baseline,
    )?;

    Ok(Some(TradeResult {
        instrument: range.instrument().clone(),
        window: range.window().clone(),
        direction,
        entry_ts: trigger.ts_local,
        entry_price,
        stop_price,
        target_price,
        exit_ts,
        exit_price,
        outcome,
        theoretical_r,
        realized_r: realized.realized_r,
        mae_r: mae_points / risk_points,
        mfe_r: mfe_points / risk_points,
    }))
}
