//! Validation stages — the common interface the pipeline folds over.
//!
//! Each stage is an object implementing [`ValidationStage`]; the
//! orchestrator runs them in order and stops at the first failure. Stages
//! communicate only through [`StageContext`], and every result carries the
//! metrics and threshold that decided it — a rejection is never mute.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orblab_core::domain::{StrategyCandidate, TradeResult};

use crate::config::PipelineConfig;
use crate::expectancy::RSummary;
use crate::harness::SimHarness;
use crate::setup::ValidatedSetup;
use crate::split::DaySplit;

mod concept;
mod cost_stress;
mod monte_carlo;
mod oos;
mod optimize;
mod promote;
mod regime;
mod rolling;
mod statistical;

pub use concept::ConceptTest;
pub use cost_stress::CostStressTest;
pub use monte_carlo::MonteCarloShuffle;
pub use oos::OutOfSampleVerification;
pub use optimize::ParameterOptimization;
pub use promote::Promotion;
pub use regime::{AtrRatioClassifier, RegimeAnalysis, RegimeClassifier, RsiTrendClassifier};
pub use rolling::RollingWindow;
pub use statistical::StatisticalValidation;

/// Fixed identity of each pipeline stage, in running order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageId {
    ConceptTest,
    ParameterOptimization,
    OutOfSampleVerification,
    CostStressTest,
    MonteCarlo,
    RegimeAnalysis,
    RollingWindow,
    StatisticalValidation,
    Promotion,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::ConceptTest => "concept_test",
            StageId::ParameterOptimization => "parameter_optimization",
            StageId::OutOfSampleVerification => "out_of_sample_verification",
            StageId::CostStressTest => "cost_stress_test",
            StageId::MonteCarlo => "monte_carlo",
            StageId::RegimeAnalysis => "regime_analysis",
            StageId::RollingWindow => "rolling_window",
            StageId::StatisticalValidation => "statistical_validation",
            StageId::Promotion => "promotion",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage: pass/fail plus the numbers that decided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStageResult {
    pub stage: StageId,
    pub passed: bool,
    pub metrics: BTreeMap<String, f64>,
    /// Present on failure: which metric broke which threshold.
    pub reason: Option<String>,
}

impl ValidationStageResult {
    pub fn pass(stage: StageId, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            stage,
            passed: true,
            metrics,
            reason: None,
        }
    }

    pub fn fail(stage: StageId, metrics: BTreeMap<String, f64>, reason: String) -> Self {
        Self {
            stage,
            passed: false,
            metrics,
            reason: Some(reason),
        }
    }
}

/// Mutable state threaded through the pipeline.
///
/// The optimizer replaces `candidate` with the frozen best configuration;
/// the out-of-sample stage caches the frozen test trades so later stages
/// re-analyze the same trade list instead of re-simulating.
pub struct StageContext<'a> {
    pub harness: &'a SimHarness<'a>,
    pub config: &'a PipelineConfig,
    pub candidate: StrategyCandidate,
    pub split: DaySplit,
    pub all_days: Vec<NaiveDate>,
    pub train_summary: Option<RSummary>,
    pub test_trades: Option<Vec<TradeResult>>,
    pub test_summary: Option<RSummary>,
    pub setup: Option<ValidatedSetup>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        harness: &'a SimHarness<'a>,
        config: &'a PipelineConfig,
        candidate: StrategyCandidate,
        split: DaySplit,
        all_days: Vec<NaiveDate>,
    ) -> Self {
        Self {
            harness,
            config,
            candidate,
            split,
            all_days,
            train_summary: None,
            test_trades: None,
            test_summary: None,
            setup: None,
        }
    }

    /// The frozen test trades; stages past out-of-sample verification may
    /// rely on them being present.
    pub fn frozen_test_trades(&self) -> Result<&[TradeResult]> {
        self.test_trades
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("out-of-sample stage has not populated test trades"))
    }
}

/// One stage of the walk-forward pipeline.
pub trait ValidationStage: Send + Sync {
    fn id(&self) -> StageId;

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<ValidationStageResult>;
}

/// Shorthand for building metric maps.
pub(crate) fn metrics<const N: usize>(pairs: [(&str, f64); N]) -> BTreeMap<String, f64> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
