//! Configuration surface — every threshold the pipeline gates on.
//!
//! Nothing in the stage logic is hard-coded: split fractions, expectancy
//! floors, degradation ceilings, stress levels, shuffle counts, significance
//! level, and the expired-trade policy all arrive through this module,
//! loaded from TOML for a run or defaulted for tests.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orblab_core::costs::CostBook;
use orblab_core::domain::{EntryFilter, InstrumentId, StopMode, StrategyCandidate, WindowId};
use orblab_core::session::WindowSpec;

use crate::expectancy::ExpiredPolicy;
use crate::grid::ParamGrid;
use crate::split::SplitFractions;

// ─── Per-stage thresholds ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptThresholds {
    pub min_expectancy: f64,
    pub min_sample: usize,
}

impl Default for ConceptThresholds {
    fn default() -> Self {
        Self {
            min_expectancy: 0.1,
            min_sample: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub grid: ParamGrid,
    /// Cells evaluated between checkpoint writes.
    pub chunk_size: usize,
    /// Minimum train-slice trades for a cell to be selectable.
    pub min_sample: usize,
    /// Optional JSONL checkpoint path for resumable searches.
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            chunk_size: 8,
            min_sample: 20,
            checkpoint_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OosThresholds {
    pub min_expectancy: f64,
    /// Maximum allowed train-to-test expectancy degradation, in percent.
    pub max_degradation_pct: f64,
}

impl Default for OosThresholds {
    fn default() -> Self {
        Self {
            min_expectancy: 0.1,
            max_degradation_pct: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressThresholds {
    /// Expectancy floor that must hold at every stressed friction level.
    pub min_expectancy: f64,
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            min_expectancy: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_shuffles: usize,
    /// Percentile of the shuffled drawdown distribution the actual drawdown
    /// must stay inside.
    pub drawdown_percentile: f64,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_shuffles: 5_000,
            drawdown_percentile: 95.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub min_expectancy: f64,
    /// Regimes with fewer trades than this are reported but not gated.
    pub min_trades_per_regime: usize,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            min_expectancy: 0.0,
            min_trades_per_regime: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingConfig {
    pub n_windows: usize,
    pub min_days_per_window: usize,
    /// Fraction of windows that must be profitable (majority = 0.5).
    pub min_profitable_fraction: f64,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            n_windows: 4,
            min_days_per_window: 40,
            min_profitable_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalThresholds {
    pub min_sample: usize,
    /// Significance level for the two-sided t-test on mean R.
    pub alpha: f64,
    pub bootstrap_resamples: usize,
    pub bootstrap_confidence: f64,
    pub seed: u64,
}

impl Default for StatisticalThresholds {
    fn default() -> Self {
        Self {
            min_sample: 30,
            alpha: 0.05,
            bootstrap_resamples: 2_000,
            bootstrap_confidence: 0.95,
            seed: 42,
        }
    }
}

// ─── Assembled pipeline config ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub split: SplitFractions,
    pub expired_policy: ExpiredPolicyConfig,
    /// Entry slippage in price points, applied in the break direction.
    pub entry_slippage: f64,
    pub concept: ConceptThresholds,
    pub optimization: OptimizationConfig,
    pub oos: OosThresholds,
    pub stress: StressThresholds,
    pub monte_carlo: MonteCarloConfig,
    pub regime: RegimeThresholds,
    pub rolling: RollingConfig,
    pub statistical: StatisticalThresholds,
}

/// Serde-friendly wrapper so the TOML reads `expired_policy = "count_as_loss"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredPolicyConfig {
    CountAsLoss,
    Exclude,
}

impl Default for ExpiredPolicyConfig {
    fn default() -> Self {
        Self::CountAsLoss
    }
}

impl From<ExpiredPolicyConfig> for ExpiredPolicy {
    fn from(value: ExpiredPolicyConfig) -> Self {
        match value {
            ExpiredPolicyConfig::CountAsLoss => ExpiredPolicy::CountAsLoss,
            ExpiredPolicyConfig::Exclude => ExpiredPolicy::Exclude,
        }
    }
}

impl PipelineConfig {
    pub fn expired_policy(&self) -> ExpiredPolicy {
        self.expired_policy.into()
    }
}

// ─── Run specification (CLI surface) ─────────────────────────────────

/// Everything one validation run needs, loadable from a single TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub instrument: InstrumentId,
    pub window: WindowId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Directory of per-instrument CSV bar files.
    pub data_dir: PathBuf,
    /// Exchange time zone for localizing bar timestamps.
    pub timezone: chrono_tz::Tz,
    pub windows: Vec<WindowSpec>,
    pub cost_book: CostBook,
    /// Default (non-optimized) candidate parameters for the concept test.
    pub target_r: f64,
    pub stop_mode: StopMode,
    #[serde(default)]
    pub filters: Vec<EntryFilter>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Errors loading a run spec.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("start date {start} is not before end date {end}")]
    EmptyDateRange { start: NaiveDate, end: NaiveDate },
    #[error("window {0} is not defined in [windows]")]
    UndefinedWindow(WindowId),
}

impl RunSpec {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: RunSpec = toml::from_str(&raw)?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(ConfigError::EmptyDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !self.windows.iter().any(|w| w.id == self.window) {
            return Err(ConfigError::UndefinedWindow(self.window.clone()));
        }
        Ok(())
    }

    /// The default candidate the concept test starts from.
    pub fn base_candidate(&self) -> StrategyCandidate {
        StrategyCandidate {
            instrument: self.instrument.clone(),
            window: self.window.clone(),
            target_r: self.target_r,
            stop_mode: self.stop_mode,
            filters: self.filters.clone(),
        }
    }

    /// Calendar days in [start_date, end_date]. Non-trading days fall out
    /// naturally as skipped days.
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut day = self.start_date;
        while day <= self.end_date {
            days.push(day);
            day = day.succ_opt().expect("calendar overflow");
        }
        days
    }
}
