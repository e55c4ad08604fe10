//! Pipeline orchestration — a fold over stages with early termination.
//!
//! The orchestrator knows nothing about what stages do; it runs them in
//! order, records every result, and stops at the first failure. Absence of
//! a pass is always a fail: a candidate is promoted only when the
//! promotion stage ran and produced a setup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use orblab_core::domain::StrategyCandidate;

use crate::setup::ValidatedSetup;
use crate::stages::{
    ConceptTest, CostStressTest, MonteCarloShuffle, OutOfSampleVerification,
    ParameterOptimization, Promotion, RegimeAnalysis, RegimeClassifier, RollingWindow, StageContext,
    StatisticalValidation, ValidationStage, ValidationStageResult,
};

/// Full record of one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// The candidate as it left the run (frozen post-optimization when the
    /// run got that far).
    pub candidate: StrategyCandidate,
    pub stage_results: Vec<ValidationStageResult>,
    pub passed: bool,
    /// Present only when every stage passed.
    pub setup: Option<ValidatedSetup>,
}

impl ValidationReport {
    /// The stage that stopped the run, if any.
    pub fn failing_stage(&self) -> Option<&ValidationStageResult> {
        self.stage_results.iter().find(|r| !r.passed)
    }
}

/// Ordered stage list with fail-fast execution.
pub struct Pipeline {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl Pipeline {
    /// The standard nine-stage walk-forward pipeline.
    pub fn standard(regime_classifier: Box<dyn RegimeClassifier>) -> Self {
        Self {
            stages: vec![
                Box::new(ConceptTest),
                Box::new(ParameterOptimization),
                Box::new(OutOfSampleVerification),
                Box::new(CostStressTest),
                Box::new(MonteCarloShuffle),
                Box::new(RegimeAnalysis::new(regime_classifier)),
                Box::new(RollingWindow),
                Box::new(StatisticalValidation),
                Box::new(Promotion),
            ],
        }
    }

    /// A custom stage list, for tests and research variants.
    pub fn new(stages: Vec<Box<dyn ValidationStage>>) -> Self {
        Self { stages }
    }

    /// Run the candidate through the stages, stopping at the first failure.
    pub fn run(&self, mut ctx: StageContext<'_>) -> Result<ValidationReport> {
        let mut stage_results = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let result = stage.run(&mut ctx)?;
            let passed = result.passed;
            if !passed {
                warn!(
                    stage = %result.stage,
                    reason = result.reason.as_deref().unwrap_or("unspecified"),
                    "candidate rejected"
                );
            }
            stage_results.push(result);
            if !passed {
                break;
            }
        }

        let all_passed = stage_results.iter().all(|r| r.passed)
            && stage_results.len() == self.stages.len();

        let setup = if all_passed {
            // Attach the full provenance to the terminal record.
            ctx.setup.take().map(|mut setup| {
                setup.stage_results = stage_results.clone();
                setup
            })
        } else {
            None
        };

        if all_passed && setup.is_none() {
            anyhow::bail!("all stages passed but no setup was produced");
        }
        if setup.is_some() {
            info!(candidate = %ctx.candidate.label(), "validation run promoted a setup");
        }

        Ok(ValidationReport {
            candidate: ctx.candidate,
            stage_results,
            passed: all_passed,
            setup,
        })
    }
}
