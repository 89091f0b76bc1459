//! # Scenario Description
//!
//! A scenario is data: the row under test, the transactions to open, one
//! flow of steps per transaction and what the run must look like afterwards.
//! Specs round-trip through JSON so new interleavings need no new code.
//!
//! ```json
//! {
//!   "name": "deadlock",
//!   "dialect": "mysql",
//!   "row": { "id": 1, "attributes": { "awesome": false } },
//!   "transactions": [
//!     { "label": "T1", "lock_mode_on_first_read": "shared", "setup_read": true },
//!     { "label": "T2", "isolation_level": "read-committed", "setup_read": true }
//!   ],
//!   "flows": [
//!     { "owner": "T2", "steps": [ { "op": "write", "txn": "T2", "patch": { "awesome": true } } ] }
//!   ],
//!   "expectation": { "reference_orderings": [["T2 write begin"]], "final_states": {} }
//! }
//! ```

use crate::domain::errors::HarnessError;
use serde::{Deserialize, Serialize};
use shared_types::{Dialect, ErrorKind, IsolationLevel, LockMode, Patch, RowSnapshot, TxnStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

// =============================================================================
// CLUSTER A: LABELS
// =============================================================================

/// Scenario-local name of a transaction, e.g. `T1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnLabel(pub String);

impl TxnLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxnLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

// =============================================================================
// CLUSTER B: SETUP AND FLOWS
// =============================================================================

/// How one transaction is opened before the flows start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxnSetup {
    pub label: TxnLabel,
    /// `None` uses the engine default.
    #[serde(default)]
    pub isolation_level: Option<IsolationLevel>,
    /// Lock mode of the transaction's first read.
    #[serde(default)]
    pub lock_mode_on_first_read: LockMode,
    /// Perform that first read during setup rather than inside a flow.
    #[serde(default)]
    pub setup_read: bool,
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    /// Synchronization point: suspend this flow for `ms`.
    Delay { ms: u64 },
    Read { txn: TxnLabel },
    Write { txn: TxnLabel, patch: Patch },
    Commit { txn: TxnLabel },
    Rollback { txn: TxnLabel },
}

impl Step {
    pub fn delay(duration: Duration) -> Self {
        Self::Delay {
            ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn read(txn: impl Into<TxnLabel>) -> Self {
        Self::Read { txn: txn.into() }
    }

    pub fn write(txn: impl Into<TxnLabel>, patch: Patch) -> Self {
        Self::Write {
            txn: txn.into(),
            patch,
        }
    }

    pub fn commit(txn: impl Into<TxnLabel>) -> Self {
        Self::Commit { txn: txn.into() }
    }

    pub fn rollback(txn: impl Into<TxnLabel>) -> Self {
        Self::Rollback { txn: txn.into() }
    }

    /// Transaction the step operates on; `None` for delays.
    pub fn txn(&self) -> Option<&TxnLabel> {
        match self {
            Self::Delay { .. } => None,
            Self::Read { txn } | Self::Write { txn, .. } | Self::Commit { txn } | Self::Rollback { txn } => {
                Some(txn)
            }
        }
    }
}

/// A sequence of steps executed in order on its own task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Transaction this flow cleans up after on failure.
    pub owner: TxnLabel,
    pub steps: Vec<Step>,
}

// =============================================================================
// CLUSTER C: EXPECTATIONS
// =============================================================================

/// The failure one flow must end with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedFailure {
    /// Owner of the flow that must fail.
    pub flow: TxnLabel,
    pub kind: ErrorKind,
    /// Exact error message.
    pub message: String,
}

/// What a run must look like to pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    /// Acceptable milestone sequences; the first is the primary ordering.
    pub reference_orderings: Vec<Vec<String>>,
    /// Terminal state of every transaction.
    pub final_states: BTreeMap<TxnLabel, TxnStatus>,
    #[serde(default)]
    pub expected_failure: Option<ExpectedFailure>,
    /// Order in which the engine must have committed, when declared.
    #[serde(default)]
    pub commit_order: Option<Vec<TxnLabel>>,
}

// =============================================================================
// CLUSTER D: SCENARIO
// =============================================================================

/// A complete, declarative interleaving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Engine dialect the expectation was written for.
    #[serde(default)]
    pub dialect: Dialect,
    /// Row (re)created before every run.
    pub row: RowSnapshot,
    /// Transactions in the order they are begun.
    pub transactions: Vec<TxnSetup>,
    /// Flows in the order they are spawned.
    pub flows: Vec<FlowSpec>,
    pub expectation: Expectation,
}

impl ScenarioSpec {
    /// Parse and validate a JSON description.
    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        let spec: ScenarioSpec =
            serde_json::from_str(json).map_err(|e| HarnessError::InvalidScenario(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        serde_json::to_string_pretty(self).map_err(|e| HarnessError::InvalidScenario(e.to_string()))
    }

    pub fn setup(&self, label: &TxnLabel) -> Option<&TxnSetup> {
        self.transactions.iter().find(|setup| &setup.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &TxnLabel> {
        self.transactions.iter().map(|setup| &setup.label)
    }

    /// Check internal consistency before anything touches the engine.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |reason: String| -> Result<(), HarnessError> {
            Err(HarnessError::InvalidScenario(format!("{}: {reason}", self.name)))
        };

        if self.name.trim().is_empty() {
            return Err(HarnessError::InvalidScenario("scenario name is empty".to_string()));
        }
        if self.transactions.is_empty() {
            return invalid("no transactions".to_string());
        }

        let mut labels = BTreeSet::new();
        for setup in &self.transactions {
            if !labels.insert(&setup.label) {
                return invalid(format!("duplicate transaction {}", setup.label));
            }
        }

        if self.flows.is_empty() {
            return invalid("no flows".to_string());
        }
        for flow in &self.flows {
            if !labels.contains(&flow.owner) {
                return invalid(format!("flow owner {} is not a transaction", flow.owner));
            }
            for step in &flow.steps {
                if let Some(txn) = step.txn() {
                    if !labels.contains(txn) {
                        return invalid(format!("step refers to unknown transaction {txn}"));
                    }
                }
            }
        }

        let expectation = &self.expectation;
        if expectation.reference_orderings.is_empty() {
            return invalid("no reference orderings".to_string());
        }
        for label in expectation.final_states.keys() {
            if !labels.contains(label) {
                return invalid(format!("final state for unknown transaction {label}"));
            }
        }
        if let Some((label, status)) = expectation
            .final_states
            .iter()
            .find(|(_, status)| !status.is_terminal())
        {
            return invalid(format!("final state of {label} is not terminal ({status})"));
        }
        if let Some(failure) = &expectation.expected_failure {
            if !self.flows.iter().any(|flow| flow.owner == failure.flow) {
                return invalid(format!("expected failure names unknown flow {}", failure.flow));
            }
        }
        if let Some(order) = &expectation.commit_order {
            for label in order {
                if !labels.contains(label) {
                    return invalid(format!("commit order names unknown transaction {label}"));
                }
            }
        }

        Ok(())
    }
}
