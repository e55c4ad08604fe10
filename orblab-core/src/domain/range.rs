//! OpeningRange — the high/low formed in the first N minutes of a window.
//!
//! The range anchors every trade: stop and target are always computed from
//! its boundaries, never from the realized entry price. A range with
//! high < low is a data corruption and is rejected at construction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{InstrumentId, WindowId};

/// Direction of a range break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// +1.0 for Up, -1.0 for Down.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

/// Stop placement relative to the opening range.
///
/// The stop sits a fractional depth into the range, measured from the broken
/// edge: `Full` is the opposite boundary (depth 1.0), `Half` the midpoint
/// (depth 0.5), `Fraction` any other depth in (0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StopMode {
    Full,
    Half,
    Fraction(f64),
}

impl StopMode {
    /// Depth into the range, from the broken edge, in [0.0, 1.0].
    pub fn depth(&self) -> f64 {
        match self {
            StopMode::Full => 1.0,
            StopMode::Half => 0.5,
            StopMode::Fraction(f) => *f,
        }
    }

    pub fn label(&self) -> String {
        match self {
            StopMode::Full => "full".to_string(),
            StopMode::Half => "half".to_string(),
            StopMode::Fraction(f) => format!("frac_{f:.2}"),
        }
    }
}

/// Errors constructing an opening range.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("inverted range for {instrument} {window} on {date}: high {high} < low {low}")]
    Inverted {
        instrument: InstrumentId,
        window: WindowId,
        date: NaiveDate,
        high: f64,
        low: f64,
    },
    #[error("non-finite range boundary for {instrument} {window} on {date}")]
    NonFinite {
        instrument: InstrumentId,
        window: WindowId,
        date: NaiveDate,
    },
}

/// The high/low band formed during one window's opening minutes.
///
/// Immutable after construction; boundaries are private so the
/// `high >= low` invariant cannot be broken after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningRange {
    date: NaiveDate,
    instrument: InstrumentId,
    window: WindowId,
    high: f64,
    low: f64,
}

impl OpeningRange {
    pub fn new(
        date: NaiveDate,
        instrument: InstrumentId,
        window: WindowId,
        high: f64,
        low: f64,
    ) -> Result<Self, RangeError> {
        if !high.is_finite() || !low.is_finite() {
            return Err(RangeError::NonFinite {
                instrument,
                window,
                date,
            });
        }
        if high < low {
            return Err(RangeError::Inverted {
                instrument,
                window,
                date,
                high,
                low,
            });
        }
        Ok(Self {
            date,
            instrument,
            window,
            high,
            low,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn window(&self) -> &WindowId {
        &self.window
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn size(&self) -> f64 {
        self.high - self.low
    }

    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// The boundary broken in the given direction.
    pub fn broken_edge(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Up => self.high,
            Direction::Down => self.low,
        }
    }

    /// Stop price for a break in the given direction: a fractional depth
    /// into the range measured from the broken edge.
    pub fn stop_price(&self, direction: Direction, mode: StopMode) -> f64 {
        let depth = mode.depth() * self.size();
        match direction {
            Direction::Up => self.high - depth,
            Direction::Down => self.low + depth,
        }
    }
}
