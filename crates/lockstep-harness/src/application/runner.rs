//! # Scenario Runner
//!
//! Repeats one scenario sequentially and aggregates the outcome of every
//! iteration. Iterations never overlap, so no lock from one iteration can
//! interfere with the next.
//!
//! | Verdict / error | Outcome | Aborts the run |
//! |---|---|---|
//! | `Passed`, no expected failure | success | no |
//! | `Passed` with expected failure | expected-failure | no |
//! | `VerificationFailed` | verification-failure | only when configured |
//! | `TransactionalFailure` or executor error | unexpected-failure | yes |

use crate::application::verifier::OutcomeVerifier;
use crate::config::RunnerConfig;
use crate::domain::errors::HarnessError;
use crate::domain::outcome::{IterationOutcome, IterationReport, RunReport, Verdict};
use crate::domain::scenario::ScenarioSpec;
use crate::ports::inbound::ScenarioExecutor;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub struct ScenarioRunner<E> {
    executor: E,
    verifier: OutcomeVerifier,
    config: RunnerConfig,
}

impl<E: ScenarioExecutor> ScenarioRunner<E> {
    pub fn new(executor: E, config: RunnerConfig) -> Self {
        Self {
            executor,
            verifier: OutcomeVerifier::new(),
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `spec` `config.iterations` times.
    ///
    /// Returns the full report, or `HarnessError::RunAborted` carrying the
    /// partial report when an iteration is fatal.
    pub async fn run(&self, spec: &ScenarioSpec) -> Result<RunReport, HarnessError> {
        spec.validate()?;
        let iterations = self.config.iterations;
        let mut report = RunReport::new(spec.name.clone(), iterations);
        info!(scenario = %spec.name, iterations, "Run started");

        for iteration in 1..=iterations {
            if iteration > 1 {
                tokio::time::sleep(self.config.settle_delay()).await;
            }

            let entry = self.run_iteration(spec, iteration).await;
            let fatal = match entry.outcome {
                IterationOutcome::UnexpectedFailure => true,
                IterationOutcome::VerificationFailure => self.config.stop_on_verification_failure,
                IterationOutcome::Success | IterationOutcome::ExpectedFailure => false,
            };
            let reason = entry.detail.clone().unwrap_or_else(|| entry.outcome.to_string());
            report.iterations.push(entry);

            if fatal {
                error!(scenario = %spec.name, iteration, %reason, "Run aborted");
                return Err(HarnessError::RunAborted {
                    iteration,
                    reason,
                    report: Box::new(report),
                });
            }
        }

        info!(
            scenario = %spec.name,
            successes = report.successes(),
            expected_failures = report.expected_failures(),
            verification_failures = report.verification_failures(),
            mean_ms = report.mean_elapsed().as_millis() as u64,
            "Run finished"
        );
        Ok(report)
    }

    async fn run_iteration(&self, spec: &ScenarioSpec, iteration: usize) -> IterationReport {
        let started = Instant::now();

        let result = match self.executor.execute(spec).await {
            Ok(result) => result,
            Err(e) => {
                warn!(scenario = %spec.name, iteration, error = %e, "Scenario could not run");
                return IterationReport {
                    iteration,
                    elapsed: started.elapsed(),
                    outcome: IterationOutcome::UnexpectedFailure,
                    verdict: None,
                    events: Vec::new(),
                    detail: Some(e.to_string()),
                };
            }
        };

        let verdict = self.verifier.verify(&spec.expectation, &result);
        let (outcome, detail) = match &verdict {
            Verdict::Passed {
                expected_failure: false,
                ..
            } => (IterationOutcome::Success, None),
            Verdict::Passed {
                expected_failure: true,
                ..
            } => {
                let failure = result.flows.iter().find_map(|flow| flow.outcome.failure());
                (
                    IterationOutcome::ExpectedFailure,
                    failure.map(|failure| format!("{}: {}", failure.kind, failure.message)),
                )
            }
            Verdict::VerificationFailed { mismatches } => (
                IterationOutcome::VerificationFailure,
                Some(join(mismatches.iter().map(ToString::to_string))),
            ),
            Verdict::TransactionalFailure { failures } => (
                IterationOutcome::UnexpectedFailure,
                Some(join(failures.iter().map(ToString::to_string))),
            ),
        };

        let elapsed = started.elapsed();
        info!(
            scenario = %spec.name,
            iteration,
            %outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "Iteration finished"
        );

        IterationReport {
            iteration,
            elapsed,
            outcome,
            verdict: Some(verdict),
            events: result.events(),
            detail,
        }
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join("; ")
}
