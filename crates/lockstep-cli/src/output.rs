//! Terminal and JSON rendering of catalogs and run reports.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lockstep_harness::{IterationReport, RunReport, ScenarioSpec, Verdict};
use serde::Serialize;

/// JSON envelope printed by `run --json`.
#[derive(Serialize)]
struct RunOutput<'a> {
    started_at: DateTime<Utc>,
    all_passed: bool,
    successes: usize,
    expected_failures: usize,
    verification_failures: usize,
    unexpected_failures: usize,
    mean_elapsed_ms: u64,
    report: &'a RunReport,
}

pub fn print_catalog(specs: &[ScenarioSpec]) {
    for spec in specs {
        println!("{:<24} {:<9} {}", spec.name, spec.dialect, spec.description);
    }
}

pub fn report_json(report: &RunReport, started_at: DateTime<Utc>) -> Result<String> {
    let output = RunOutput {
        started_at,
        all_passed: report.all_passed(),
        successes: report.successes(),
        expected_failures: report.expected_failures(),
        verification_failures: report.verification_failures(),
        unexpected_failures: report.unexpected_failures(),
        mean_elapsed_ms: u64::try_from(report.mean_elapsed().as_millis()).unwrap_or(u64::MAX),
        report,
    };
    serde_json::to_string_pretty(&output).context("Failed to serialize run report")
}

pub fn print_report(report: &RunReport, started_at: DateTime<Utc>) {
    println!(
        "scenario {} started {}",
        report.scenario,
        started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for iteration in &report.iterations {
        println!("{}", iteration_line(iteration));
    }
    println!(
        "{}/{} iterations: {} success, {} expected failure, {} verification failure, {} unexpected failure (mean {} ms)",
        report.iterations.len(),
        report.requested,
        report.successes(),
        report.expected_failures(),
        report.verification_failures(),
        report.unexpected_failures(),
        report.mean_elapsed().as_millis()
    );
}

fn iteration_line(iteration: &IterationReport) -> String {
    let mut line = format!(
        "#{:<3} {:<20} {:>6} ms",
        iteration.iteration,
        iteration.outcome.to_string(),
        iteration.elapsed.as_millis()
    );
    if let Some(Verdict::Passed { matched_reference, .. }) = &iteration.verdict {
        line.push_str(&format!("  reference {matched_reference}"));
    }
    if let Some(detail) = &iteration.detail {
        line.push_str(&format!("  {detail}"));
    }
    line
}
