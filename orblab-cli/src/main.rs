//! ORB Lab CLI — feature builds, one-off simulations, validation runs.
//!
//! Commands:
//! - `features` — build and print the feature row for one day
//! - `simulate` — run the configured candidate on one day, print the trade
//! - `validate` — run the full nine-stage pipeline, write the report, and
//!   append any promoted setup to the ledger

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use orblab_core::features::{BuildOutcome, FeatureAggregator, FeatureConfig};
use orblab_core::store::CsvBarStore;
use orblab_runner::stages::{AtrRatioClassifier, RegimeClassifier, RsiTrendClassifier};
use orblab_runner::{
    chronological_split, Pipeline, RunSpec, SetupLedger, SimHarness, StageContext,
};

#[derive(Parser)]
#[command(name = "orblab", about = "Opening-range-breakout validation lab")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print the feature row for one day.
    Features {
        /// Path to the run spec TOML.
        #[arg(long)]
        config: PathBuf,

        /// Trading day (YYYY-MM-DD).
        #[arg(long)]
        date: String,
    },
    /// Simulate the configured candidate on one day and print the trade.
    Simulate {
        /// Path to the run spec TOML.
        #[arg(long)]
        config: PathBuf,

        /// Trading day (YYYY-MM-DD).
        #[arg(long)]
        date: String,
    },
    /// Run the full validation pipeline for the configured candidate.
    Validate {
        /// Path to the run spec TOML.
        #[arg(long)]
        config: PathBuf,

        /// Regime classifier: atr_ratio or rsi_trend.
        #[arg(long, default_value = "atr_ratio")]
        classifier: String,

        /// Output path for the per-run report JSON.
        #[arg(long, default_value = "results/report.json")]
        report: PathBuf,

        /// Append-only ledger of promoted setups.
        #[arg(long, default_value = "results/setups.jsonl")]
        setups: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Features { config, date } => features(&config, &date),
        Commands::Simulate { config, date } => simulate(&config, &date),
        Commands::Validate {
            config,
            classifier,
            report,
            setups,
        } => validate(&config, &classifier, &report, &setups),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date: {raw}"))
}

fn features(config: &PathBuf, date: &str) -> Result<()> {
    let spec = RunSpec::load(config)?;
    let date = parse_date(date)?;
    let store = CsvBarStore::new(&spec.data_dir, spec.timezone);
    let aggregator = FeatureAggregator::new(&store, &spec.windows, FeatureConfig::default());

    match aggregator.build(date, &spec.instrument)? {
        BuildOutcome::Row(row) => {
            println!("{}", serde_json::to_string_pretty(&row)?);
            println!("fingerprint: {}", row.fingerprint());
        }
        BuildOutcome::Skipped(reason) => println!("skipped: {reason:?}"),
    }
    Ok(())
}

fn simulate(config: &PathBuf, date: &str) -> Result<()> {
    let spec = RunSpec::load(config)?;
    let date = parse_date(date)?;
    let store = CsvBarStore::new(&spec.data_dir, spec.timezone);
    let harness = SimHarness::new(
        &store,
        &spec.windows,
        &spec.cost_book,
        FeatureConfig::default(),
        spec.pipeline.entry_slippage,
    );

    match harness.simulate_day(&spec.base_candidate(), date)? {
        Some(trade) => println!("{}", serde_json::to_string_pretty(&trade)?),
        None => println!("no trade: day skipped, filtered, or no break"),
    }
    Ok(())
}

fn validate(
    config: &PathBuf,
    classifier: &str,
    report_path: &PathBuf,
    setups_path: &PathBuf,
) -> Result<()> {
    let spec = RunSpec::load(config)?;
    let classifier: Box<dyn RegimeClassifier> = match classifier {
        "atr_ratio" => Box::new(AtrRatioClassifier::default()),
        "rsi_trend" => Box::new(RsiTrendClassifier::default()),
        other => bail!("unknown classifier: {other} (expected atr_ratio or rsi_trend)"),
    };

    let store = CsvBarStore::new(&spec.data_dir, spec.timezone);
    let harness = SimHarness::new(
        &store,
        &spec.windows,
        &spec.cost_book,
        FeatureConfig::default(),
        spec.pipeline.entry_slippage,
    );
    let days = spec.days();
    let split = chronological_split(&days, &spec.pipeline.split)?;
    let ctx = StageContext::new(&harness, &spec.pipeline, spec.base_candidate(), split, days);

    let report = Pipeline::standard(classifier).run(ctx)?;

    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(report_path, serde_json::to_string_pretty(&report)?)?;

    println!("candidate: {}", report.candidate.label());
    for result in &report.stage_results {
        let mark = if result.passed { "pass" } else { "FAIL" };
        match &result.reason {
            Some(reason) => println!("  {:<28} {}  ({reason})", result.stage.to_string(), mark),
            None => println!("  {:<28} {}", result.stage.to_string(), mark),
        }
    }

    match report.setup {
        Some(setup) => {
            SetupLedger::new(setups_path).append(&setup)?;
            println!(
                "promoted: expectancy {:.3}R over {} trades (win rate {:.0}%)",
                setup.realized_expectancy,
                setup.sample_size,
                setup.win_rate * 100.0
            );
        }
        None => println!("not promoted"),
    }
    Ok(())
}
