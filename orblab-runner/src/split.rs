//! Chronological data splitting — train/validation/test and rolling windows.
//!
//! Splits are always chronological. Shuffling time-series data leaks future
//! information into training, so there is deliberately no API for it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Split proportions; the test share is the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub validation: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.6,
            validation: 0.2,
        }
    }
}

impl SplitFractions {
    pub fn test(&self) -> f64 {
        1.0 - self.train - self.validation
    }
}

/// One chronological partition of trading days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySplit {
    pub train: Vec<NaiveDate>,
    pub validation: Vec<NaiveDate>,
    pub test: Vec<NaiveDate>,
}

/// Errors from splitting.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("invalid split fractions: train {train}, validation {validation}")]
    InvalidFractions { train: f64, validation: f64 },
    #[error("too few days to split: {got} < minimum {min}")]
    TooFewDays { got: usize, min: usize },
    #[error("cannot fit {n_windows} rolling windows of {min_days} days in {total} days")]
    WindowsDontFit {
        n_windows: usize,
        min_days: usize,
        total: usize,
    },
}

/// Split days chronologically into train/validation/test.
///
/// Input days are sorted and deduplicated first; each partition is
/// non-empty or the split fails.
pub fn chronological_split(
    days: &[NaiveDate],
    fractions: &SplitFractions,
) -> Result<DaySplit, SplitError> {
    let valid = fractions.train > 0.0
        && fractions.validation > 0.0
        && fractions.test() > 0.0
        && fractions.train + fractions.validation < 1.0;
    if !valid {
        return Err(SplitError::InvalidFractions {
            train: fractions.train,
            validation: fractions.validation,
        });
    }

    let mut sorted: Vec<NaiveDate> = days.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let n = sorted.len();
    if n < 3 {
        return Err(SplitError::TooFewDays { got: n, min: 3 });
    }

    let train_end = ((n as f64 * fractions.train).floor() as usize).max(1);
    let validation_end =
        ((n as f64 * (fractions.train + fractions.validation)).floor() as usize).max(train_end + 1);
    let validation_end = validation_end.min(n - 1);

    Ok(DaySplit {
        train: sorted[..train_end].to_vec(),
        validation: sorted[train_end..validation_end].to_vec(),
        test: sorted[validation_end..].to_vec(),
    })
}

/// Contiguous rolling windows over the day list, oldest first.
///
/// Windows partition the span evenly; each must hold at least `min_days`.
pub fn rolling_windows(
    days: &[NaiveDate],
    n_windows: usize,
    min_days: usize,
) -> Result<Vec<Vec<NaiveDate>>, SplitError> {
    let mut sorted: Vec<NaiveDate> = days.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let n = sorted.len();
    if n_windows == 0 || n / n_windows.max(1) < min_days {
        return Err(SplitError::WindowsDontFit {
            n_windows,
            min_days,
            total: n,
        });
    }

    let window_size = n / n_windows;
    let mut windows = Vec::with_capacity(n_windows);
    for i in 0..n_windows {
        let start = i * window_size;
        let end = if i == n_windows - 1 {
            n
        } else {
            start + window_size
        };
        windows.push(sorted[start..end].to_vec());
    }
    Ok(windows)
}
