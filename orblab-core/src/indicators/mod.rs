//! Daily indicators computed from completed prior days.
//!
//! Inputs are per-day OHLC summaries, never intraday bars: an indicator for
//! day D may only see days strictly before D.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

mod atr;
mod rsi;

pub use atr::{true_range, wilder_smooth};
pub use rsi::rsi_series;

/// One completed day collapsed to OHLC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Latest ATR over `period` days, or `None` with insufficient history.
pub fn latest_atr(days: &[DaySummary], period: usize) -> Option<f64> {
    let tr = true_range(days);
    let smoothed = wilder_smooth(&tr, period);
    smoothed
        .last()
        .copied()
        .filter(|v| v.is_finite())
}

/// Latest RSI over `period` days, or `None` with insufficient history.
pub fn latest_rsi(days: &[DaySummary], period: usize) -> Option<f64> {
    let closes: Vec<f64> = days.iter().map(|d| d.close).collect();
    let series = rsi_series(&closes, period);
    series.last().copied().filter(|v| v.is_finite())
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {expected}, got {actual}"
    );
}

#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-9;
