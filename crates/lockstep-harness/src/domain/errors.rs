//! Error types for the harness
//!
//! Transactional errors raised inside a flow are not `HarnessError`s: they
//! are captured into the flow's outcome and judged by the verifier. These
//! variants cover everything that prevents a scenario from being judged.

use crate::domain::outcome::RunReport;
use crate::domain::scenario::TxnLabel;
use shared_types::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Scenario description failed to parse or validate
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    /// No built-in scenario with this name
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// Row under test could not be created
    #[error("Seeding row {row} failed: {source}")]
    Seed {
        row: u64,
        #[source]
        source: StoreError,
    },

    /// Beginning a transaction or its setup read failed
    #[error("Setup of {txn} failed: {source}")]
    Setup {
        txn: TxnLabel,
        #[source]
        source: StoreError,
    },

    /// A flow task panicked or was cancelled
    #[error("Flow {owner} did not finish: {reason}")]
    FlowTask { owner: TxnLabel, reason: String },

    /// The runner stopped early; `report` holds the iterations run so far
    #[error("Run aborted at iteration {iteration}: {reason}")]
    RunAborted {
        iteration: usize,
        reason: String,
        report: Box<RunReport>,
    },
}

impl HarnessError {
    /// Partial report of an aborted run.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::RunAborted { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}
