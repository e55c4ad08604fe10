//! Cost book — per-instrument contract economics and the cost-to-R transform.
//!
//! This module is the only owner of the friction formula. Everything that
//! needs a cost-embedded R-multiple delegates to [`CostBook::realize`]; no
//! other component may restate the arithmetic. Stress levels scale friction
//! and nothing else, so robustness testing never touches trade logic.
//!
//! ```text
//! risk_dollars   = stop_points * point_value + friction
//! reward_dollars = stop_points * point_value * theoretical_R - friction
//! realized_R     = reward_dollars / risk_dollars
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::InstrumentId;

/// Contract tick geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Minimum price increment in points.
    pub tick_size: f64,
    /// Dollar value of one tick.
    pub tick_value: f64,
}

impl ContractSpec {
    /// Dollar value of one full price point.
    pub fn point_value(&self) -> f64 {
        self.tick_value / self.tick_size
    }
}

/// Round-trip friction components, all in dollars per contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictionSchedule {
    pub commission: f64,
    pub slippage: f64,
    pub spread: f64,
}

impl FrictionSchedule {
    pub fn total(&self) -> f64 {
        self.commission + self.slippage + self.spread
    }
}

/// Friction stress multiplier used by robustness testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    Baseline,
    Plus25,
    Plus50,
    Plus100,
}

impl StressLevel {
    pub const ALL_STRESSED: [StressLevel; 3] =
        [StressLevel::Plus25, StressLevel::Plus50, StressLevel::Plus100];

    pub fn multiplier(&self) -> f64 {
        match self {
            StressLevel::Baseline => 1.0,
            StressLevel::Plus25 => 1.25,
            StressLevel::Plus50 => 1.5,
            StressLevel::Plus100 => 2.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StressLevel::Baseline => "baseline",
            StressLevel::Plus25 => "friction_125pct",
            StressLevel::Plus50 => "friction_150pct",
            StressLevel::Plus100 => "friction_200pct",
        }
    }
}

/// Cost-embedded reward:risk with its dollar legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealizedRr {
    pub risk_dollars: f64,
    pub reward_dollars: f64,
    pub realized_r: f64,
}

/// Errors from cost lookups and the realize transform.
#[derive(Debug, Error)]
pub enum CostError {
    #[error("no cost entry for instrument {0}")]
    UnknownInstrument(InstrumentId),
    #[error("zero or negative risk for {instrument}: stop {stop_points} points")]
    ZeroRisk {
        instrument: InstrumentId,
        stop_points: f64,
    },
}

/// Per-instrument contract spec and friction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentCosts {
    pub contract: ContractSpec,
    pub friction: FrictionSchedule,
}

/// Versioned, read-only book of per-instrument economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBook {
    /// Config version string, carried into reports so a setup can be traced
    /// back to the cost assumptions it was validated under.
    pub version: String,
    pub instruments: BTreeMap<InstrumentId, InstrumentCosts>,
}

impl CostBook {
    pub fn spec(&self, instrument: &InstrumentId) -> Result<&ContractSpec, CostError> {
        self.instruments
            .get(instrument)
            .map(|c| &c.contract)
            .ok_or_else(|| CostError::UnknownInstrument(instrument.clone()))
    }

    /// Friction in dollars at the given stress level.
    pub fn friction(
        &self,
        instrument: &InstrumentId,
        stress: StressLevel,
    ) -> Result<f64, CostError> {
        self.instruments
            .get(instrument)
            .map(|c| c.friction.total() * stress.multiplier())
            .ok_or_else(|| CostError::UnknownInstrument(instrument.clone()))
    }

    /// Embed friction into both legs of a theoretical reward:risk ratio.
    ///
    /// Pure and referentially transparent: identical inputs always produce
    /// identical outputs.
    pub fn realize(
        &self,
        instrument: &InstrumentId,
        stop_points: f64,
        theoretical_r: f64,
        stress: StressLevel,
    ) -> Result<RealizedRr, CostError> {
        let costs = self
            .instruments
            .get(instrument)
            .ok_or_else(|| CostError::UnknownInstrument(instrument.clone()))?;

        if stop_points <= 0.0 || !stop_points.is_finite() {
            return Err(CostError::ZeroRisk {
                instrument: instrument.clone(),
                stop_points,
            });
        }

        let friction = costs.friction.total() * stress.multiplier();
        let stop_dollars = stop_points * costs.contract.point_value();
        let risk_dollars = stop_dollars + friction;
        let reward_dollars = stop_dollars * theoretical_r - friction;

        Ok(RealizedRr {
            risk_dollars,
            reward_dollars,
            realized_r: reward_dollars / risk_dollars,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> CostBook {
        let mut instruments = BTreeMap::new();
        instruments.insert(
            InstrumentId::from("MES"),
            InstrumentCosts {
                contract: ContractSpec {
                    tick_size: 0.25,
                    tick_value: 2.5,
                },
                friction: FrictionSchedule {
                    commission: 2.5,
                    slippage: 2.5,
                    spread: 2.4,
                },
            },
        );
        CostBook {
            version: "2024-03".to_string(),
            instruments,
        }
    }

    #[test]
    fn point_value_from_ticks() {
        let book = sample_book();
        assert!((book.spec(&"MES".into()).unwrap().point_value() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn cost_embedding_reference_values() {
        // stop 2.5 pts at $10/pt with $7.40 friction and 2:1 theoretical:
        // risk $32.40, reward $42.60, realized 1.3148...
        let book = sample_book();
        let rr = book
            .realize(&"MES".into(), 2.5, 2.0, StressLevel::Baseline)
            .unwrap();
        assert!((rr.risk_dollars - 32.40).abs() < 1e-9);
        assert!((rr.reward_dollars - 42.60).abs() < 1e-9);
        assert!((rr.realized_r - 42.60 / 32.40).abs() < 1e-12);
        assert!(rr.realized_r < 2.0);
    }

    #[test]
    fn full_loss_realizes_to_minus_one() {
        // At theoretical -1 the reward leg equals the negated risk leg, so
        // friction cancels and the loss is exactly -1R at any stress level.
        let book = sample_book();
        for stress in [StressLevel::Baseline, StressLevel::Plus100] {
            let rr = book.realize(&"MES".into(), 2.5, -1.0, stress).unwrap();
            assert!((rr.realized_r - (-1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn stress_scales_friction_only() {
        let book = sample_book();
        let base = book.friction(&"MES".into(), StressLevel::Baseline).unwrap();
        assert!((base - 7.40).abs() < 1e-12);
        assert!(
            (book.friction(&"MES".into(), StressLevel::Plus25).unwrap() - 9.25).abs() < 1e-12
        );
        assert!(
            (book.friction(&"MES".into(), StressLevel::Plus100).unwrap() - 14.80).abs() < 1e-12
        );
    }

    #[test]
    fn higher_stress_lowers_realized_r() {
        let book = sample_book();
        let base = book
            .realize(&"MES".into(), 2.5, 2.0, StressLevel::Baseline)
            .unwrap();
        let stressed = book
            .realize(&"MES".into(), 2.5, 2.0, StressLevel::Plus100)
            .unwrap();
        assert!(stressed.realized_r < base.realized_r);
    }

    #[test]
    fn zero_stop_is_an_error() {
        let book = sample_book();
        let err = book
            .realize(&"MES".into(), 0.0, 2.0, StressLevel::Baseline)
            .unwrap_err();
        assert!(matches!(err, CostError::ZeroRisk { .. }));
    }

    #[test]
    fn unknown_instrument_is_an_error() {
        let book = sample_book();
        assert!(matches!(
            book.realize(&"ZB".into(), 2.5, 2.0, StressLevel::Baseline),
            Err(CostError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn realize_is_deterministic() {
        let book = sample_book();
        let first = book
            .realize(&"MES".into(), 2.5, 2.0, StressLevel::Baseline)
            .unwrap();
        for _ in 0..100 {
            let again = book
                .realize(&"MES".into(), 2.5, 2.0, StressLevel::Baseline)
                .unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn toml_roundtrip() {
        let book = sample_book();
        let toml = toml::to_string(&book).unwrap();
        let back: CostBook = toml::from_str(&toml).unwrap();
        assert_eq!(book, back);
    }
}
