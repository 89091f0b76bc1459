//! Lockstep CLI
//!
//! Runs built-in or JSON-described interleaving scenarios against the
//! in-memory engine and reports the outcome of every iteration.
//!
//! Usage:
//!   lockstep list
//!   lockstep run deadlock --iterations 10
//!   lockstep run contention --delay-ms 200 --json
//!   lockstep show plain-read-not-blocked > custom.json
//!   lockstep run-file custom.json

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lockstep_engine::{EngineConfig, InMemoryEngine};
use lockstep_harness::{
    catalog, CatalogConfig, HarnessError, RunReport, RunnerConfig, ScenarioOrchestrator,
    ScenarioRunner, ScenarioSpec,
};
use lockstep_telemetry::{init_telemetry, TelemetryConfig};
use shared_types::Dialect;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Instrument};

#[derive(Parser, Debug)]
#[command(name = "lockstep")]
#[command(author, version, about = "Concurrent-transaction interleaving harness", long_about = None)]
struct Cli {
    /// Log filter (overrides LOCKSTEP_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in scenarios
    List,
    /// Print a built-in scenario as JSON
    Show {
        scenario: String,

        /// Writer delay baked into the scenario (milliseconds)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Run a built-in scenario
    Run {
        scenario: String,

        /// Writer delay baked into the scenario (milliseconds)
        #[arg(long)]
        delay_ms: Option<u64>,

        #[command(flatten)]
        options: RunOptions,
    },
    /// Run a scenario described in a JSON file
    RunFile {
        path: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },
}

#[derive(Args, Debug)]
struct RunOptions {
    /// Number of sequential iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Pause between iterations (milliseconds)
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Abort on the first verification failure
    #[arg(long)]
    strict: bool,

    /// Run against this engine dialect instead of the scenario's own
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl RunOptions {
    fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::from_env();
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }
        if self.strict {
            config.stop_on_verification_failure = true;
        }
        config
    }
}

fn catalog_config(delay_ms: Option<u64>) -> CatalogConfig {
    let mut config = CatalogConfig::from_env();
    if let Some(delay_ms) = delay_ms {
        config.writer_delay_ms = delay_ms;
    }
    config
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &cli.log_level {
        telemetry = telemetry.with_log_level(level);
    }
    init_telemetry(telemetry).context("Failed to initialize logging")?;

    match cli.command {
        Command::List => {
            output::print_catalog(&catalog::all(&CatalogConfig::from_env()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { scenario, delay_ms } => {
            let spec = catalog::by_name(&scenario, &catalog_config(delay_ms))?;
            println!("{}", spec.to_json().context("Failed to serialize scenario")?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            scenario,
            delay_ms,
            options,
        } => {
            let spec = catalog::by_name(&scenario, &catalog_config(delay_ms))?;
            run(spec, &options).await
        }
        Command::RunFile { path, options } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let spec = ScenarioSpec::from_json(&json)
                .with_context(|| format!("Failed to load scenario from {}", path.display()))?;
            run(spec, &options).await
        }
    }
}

async fn run(spec: ScenarioSpec, options: &RunOptions) -> Result<ExitCode> {
    let dialect = options.dialect.unwrap_or(spec.dialect);
    let engine = InMemoryEngine::new(EngineConfig {
        dialect,
        ..EngineConfig::from_env()
    });
    let runner = ScenarioRunner::new(
        ScenarioOrchestrator::new(Arc::new(engine)),
        options.runner_config(),
    );

    info!(scenario = %spec.name, %dialect, "Starting lockstep run");
    let span = lockstep_telemetry::run_span!(spec.name, %dialect, iterations = runner.config().iterations);
    let started_at = chrono::Utc::now();

    match runner.run(&spec).instrument(span).await {
        Ok(report) => {
            emit(&report, started_at, options.json)?;
            if report.all_passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(HarnessError::RunAborted {
            iteration,
            reason,
            report,
        }) => {
            emit(&report, started_at, options.json)?;
            eprintln!("run aborted at iteration {iteration}: {reason}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn emit(report: &RunReport, started_at: chrono::DateTime<chrono::Utc>, json: bool) -> Result<()> {
    if json {
        println!("{}", output::report_json(report, started_at)?);
    } else {
        output::print_report(report, started_at);
    }
    Ok(())
}
