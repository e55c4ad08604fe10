//! End-to-end pipeline runs over scripted synthetic data.
//!
//! The fixtures are deterministic day scripts, so each test pins the exact
//! stage where a candidate should pass or die.

use orblab_runner::config::{
    ConceptThresholds, ExpiredPolicyConfig, MonteCarloConfig, OptimizationConfig,
    PipelineConfig, RegimeThresholds, RollingConfig, StatisticalThresholds,
};
use orblab_runner::stages::{RsiTrendClassifier, StageContext, StageId};
use orblab_runner::testdata::{self, DayScript, Fixture};
use orblab_runner::{chronological_split, ParamGrid, Pipeline, SplitFractions};

use orblab_core::domain::StopMode;

fn test_config() -> PipelineConfig {
    PipelineConfig {
        split: SplitFractions::default(),
        expired_policy: ExpiredPolicyConfig::CountAsLoss,
        entry_slippage: 0.0,
        concept: ConceptThresholds {
            min_expectancy: 0.1,
            min_sample: 10,
        },
        optimization: OptimizationConfig {
            grid: ParamGrid::default(),
            chunk_size: 4,
            min_sample: 20,
            checkpoint_path: None,
        },
        oos: Default::default(),
        stress: Default::default(),
        monte_carlo: MonteCarloConfig {
            n_shuffles: 200,
            drawdown_percentile: 95.0,
            seed: 42,
        },
        regime: RegimeThresholds {
            min_expectancy: 0.0,
            min_trades_per_regime: 5,
        },
        rolling: RollingConfig {
            n_windows: 3,
            min_days_per_window: 15,
            min_profitable_fraction: 0.5,
        },
        statistical: StatisticalThresholds {
            min_sample: 10,
            alpha: 0.05,
            bootstrap_resamples: 500,
            bootstrap_confidence: 0.95,
            seed: 42,
        },
    }
}

fn run_pipeline(fixture: &Fixture, config: &PipelineConfig) -> orblab_runner::ValidationReport {
    let harness = fixture.harness();
    let split = chronological_split(&fixture.days, &config.split).unwrap();
    let ctx = StageContext::new(
        &harness,
        config,
        testdata::candidate(2.0, StopMode::Full),
        split,
        fixture.days.clone(),
    );
    let pipeline = Pipeline::standard(Box::new(RsiTrendClassifier::default()));
    pipeline.run(ctx).unwrap()
}

#[test]
fn strong_candidate_promotes_through_all_nine_stages() {
    let fixture = Fixture::trending(60);
    let config = test_config();
    let report = run_pipeline(&fixture, &config);

    assert!(report.passed, "failing stage: {:?}", report.failing_stage());
    assert_eq!(report.stage_results.len(), 9);
    assert!(report.stage_results.iter().all(|r| r.passed));

    let setup = report.setup.expect("promotion must produce a setup");
    assert!(setup.walkforward_validated);
    assert_eq!(setup.win_rate, 1.0);
    assert_eq!(setup.sample_size, 12); // 20% test slice of 60 days
    assert!(setup.realized_expectancy > 0.0);
    assert!(setup.realized_expectancy < setup.theoretical_expectancy);
    assert_eq!(setup.stage_results.len(), 9);
    assert_eq!(setup.cost_book_version, "test");

    // The optimizer must have frozen the most favorable grid cell: the
    // full-range stop carries the widest risk base, so higher targets
    // realize better after fixed friction.
    assert_eq!(report.candidate.stop_mode, StopMode::Full);
    assert_eq!(report.candidate.target_r, 3.0);
}

#[test]
fn degraded_test_slice_fails_out_of_sample_and_halts() {
    // Train and validation slices win; the test slice is all losses. The
    // run must die at out-of-sample verification and never reach later
    // stages.
    let fixture = Fixture::win_then_loss(48, 12);
    let config = test_config();
    let report = run_pipeline(&fixture, &config);

    assert!(!report.passed);
    assert!(report.setup.is_none());

    let failing = report.failing_stage().expect("a stage must have failed");
    assert_eq!(failing.stage, StageId::OutOfSampleVerification);
    assert!(failing.reason.is_some());
    assert!(failing.metrics["test_expectancy"] < 0.0);

    // Fail-fast: concept, optimization, oos — nothing after.
    assert_eq!(report.stage_results.len(), 3);
}

#[test]
fn weak_concept_dies_at_the_first_stage() {
    // Validation slice (days 36..48) is all losses: the concept test runs
    // the default candidate there and must reject before any optimization.
    let mut scripts = vec![DayScript::Win; 36];
    scripts.extend(vec![DayScript::Loss; 12]);
    scripts.extend(vec![DayScript::Win; 12]);
    let fixture = Fixture::scripted(&scripts);
    let config = test_config();
    let report = run_pipeline(&fixture, &config);

    assert!(!report.passed);
    assert_eq!(report.stage_results.len(), 1);
    assert_eq!(report.stage_results[0].stage, StageId::ConceptTest);
    assert!(report.stage_results[0].reason.is_some());
}

#[test]
fn every_rejection_names_its_stage_and_threshold() {
    let fixture = Fixture::win_then_loss(48, 12);
    let config = test_config();
    let report = run_pipeline(&fixture, &config);

    let failing = report.failing_stage().unwrap();
    let reason = failing.reason.as_ref().unwrap();
    assert!(
        reason.contains("expectancy") || reason.contains("degradation"),
        "reason must name the failed metric: {reason}"
    );
    assert!(failing.metrics.contains_key("min_expectancy"));
    assert!(failing.metrics.contains_key("max_degradation_pct"));
}

#[test]
fn pipeline_is_deterministic_across_runs() {
    let fixture = Fixture::trending(60);
    let config = test_config();

    let first = run_pipeline(&fixture, &config);
    let second = run_pipeline(&fixture, &config);

    assert_eq!(first.passed, second.passed);
    assert_eq!(first.stage_results, second.stage_results);
    assert_eq!(first.candidate, second.candidate);

    // Setups differ only in their wall-clock validation timestamp.
    let (a, b) = (first.setup.unwrap(), second.setup.unwrap());
    assert_eq!(a.candidate_hash, b.candidate_hash);
    assert_eq!(a.realized_expectancy, b.realized_expectancy);
}

#[test]
fn promoted_setup_roundtrips_through_the_ledger() {
    let fixture = Fixture::trending(60);
    let config = test_config();
    let report = run_pipeline(&fixture, &config);
    let setup = report.setup.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let ledger = orblab_runner::SetupLedger::new(dir.path().join("setups.jsonl"));
    ledger.append(&setup).unwrap();

    let stored = ledger.read_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], setup);
}
