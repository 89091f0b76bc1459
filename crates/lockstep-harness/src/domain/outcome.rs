//! # Results and Verdicts
//!
//! What one run produced (`ScenarioResult`), what the verifier concluded
//! (`Verdict`) and what the runner aggregated over many runs (`RunReport`).

use crate::domain::events::Milestone;
use crate::domain::scenario::TxnLabel;
use serde::{Deserialize, Serialize};
use shared_types::{CommitSeq, ErrorKind, IsolationLevel, StoreError, TxnId, TxnStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: SCENARIO RESULT
// =============================================================================

/// Classified error captured from a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFailure {
    /// Transaction the failing step operated on.
    pub txn: TxnLabel,
    pub kind: ErrorKind,
    pub message: String,
}

impl FlowFailure {
    pub fn from_store(txn: TxnLabel, error: &StoreError) -> Self {
        Self {
            txn,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with {}: {}", self.txn, self.kind, self.message)
    }
}

/// How a flow ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum FlowOutcome {
    /// Every step ran.
    Completed,
    /// The flow saw its transaction already terminal and skipped the rest.
    Stopped { skipped: usize },
    Failed(FlowFailure),
}

impl FlowOutcome {
    pub fn failure(&self) -> Option<&FlowFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    pub owner: TxnLabel,
    pub outcome: FlowOutcome,
}

/// Final state of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnReport {
    pub id: TxnId,
    pub isolation_level: IsolationLevel,
    pub status: TxnStatus,
    pub commit_seq: Option<CommitSeq>,
    pub aborted_by_engine: bool,
    /// Rolled back by the orchestrator's final sweep rather than a flow.
    pub swept: bool,
}

/// Everything one run produced; consumed once by the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub run_id: Uuid,
    pub milestones: Vec<Milestone>,
    pub transactions: BTreeMap<TxnLabel, TxnReport>,
    pub flows: Vec<FlowReport>,
    /// Transactions the engine still reported open after the run.
    pub leaked: usize,
    pub elapsed: Duration,
}

impl ScenarioResult {
    /// Milestone labels in recorded order.
    pub fn events(&self) -> Vec<String> {
        self.milestones
            .iter()
            .map(|milestone| milestone.label.clone())
            .collect()
    }

    /// Transactions that committed, in engine commit order.
    pub fn commit_order(&self) -> Vec<TxnLabel> {
        let mut committed: Vec<(CommitSeq, &TxnLabel)> = self
            .transactions
            .iter()
            .filter_map(|(label, report)| report.commit_seq.map(|seq| (seq, label)))
            .collect();
        committed.sort();
        committed.into_iter().map(|(_, label)| label.clone()).collect()
    }

    pub fn flow(&self, owner: &TxnLabel) -> Option<&FlowReport> {
        self.flows.iter().find(|flow| &flow.owner == owner)
    }
}

// =============================================================================
// CLUSTER B: VERDICT
// =============================================================================

/// A property of the run that did not hold, while every flow behaved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mismatch", rename_all = "kebab-case")]
pub enum Mismatch {
    /// Recorded order equals none of the references.
    Ordering {
        actual: Vec<String>,
        candidates: Vec<Vec<String>>,
    },
    TerminalState {
        txn: TxnLabel,
        expected: TxnStatus,
        actual: Option<TxnStatus>,
    },
    /// Engine commit order differs from the declared one.
    CommitOrder {
        expected: Vec<TxnLabel>,
        actual: Vec<TxnLabel>,
    },
    LeakedTransactions { count: usize },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordering { actual, candidates } => {
                write!(f, "ordering {actual:?} matches none of {} references", candidates.len())?;
                for (i, candidate) in candidates.iter().enumerate() {
                    write!(f, "\n  [{i}] {candidate:?}")?;
                }
                Ok(())
            }
            Self::TerminalState { txn, expected, actual } => match actual {
                Some(actual) => write!(f, "{txn} ended {actual}, expected {expected}"),
                None => write!(f, "{txn} never began, expected {expected}"),
            },
            Self::CommitOrder { expected, actual } => {
                write!(f, "engine committed {actual:?}, expected {expected:?}")
            }
            Self::LeakedTransactions { count } => write!(f, "{count} transaction(s) left open"),
        }
    }
}

/// A flow failed in a way the scenario does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransactionalFailure {
    /// A flow that was not expected to fail raised an error.
    Unexpected { flow: TxnLabel, failure: FlowFailure },
    /// The expected failure did not happen.
    MissingExpectedFailure { flow: TxnLabel },
    /// The expected flow failed, but with another error.
    WrongFailure {
        flow: TxnLabel,
        expected_kind: ErrorKind,
        expected_message: String,
        failure: FlowFailure,
    },
}

impl fmt::Display for TransactionalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unexpected { flow, failure } => write!(f, "flow {flow}: unexpected error, {failure}"),
            Self::MissingExpectedFailure { flow } => write!(f, "flow {flow}: expected failure did not occur"),
            Self::WrongFailure {
                flow,
                expected_kind,
                expected_message,
                failure,
            } => write!(
                f,
                "flow {flow}: expected {expected_kind} ({expected_message:?}), got {} ({:?})",
                failure.kind, failure.message
            ),
        }
    }
}

/// Judgement over one `ScenarioResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum Verdict {
    Passed {
        /// Index of the matched reference ordering; 0 is the primary.
        matched_reference: usize,
        /// The scenario's expected failure occurred as declared.
        expected_failure: bool,
    },
    VerificationFailed { mismatches: Vec<Mismatch> },
    TransactionalFailure { failures: Vec<TransactionalFailure> },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

// =============================================================================
// CLUSTER C: RUN REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterationOutcome {
    Success,
    ExpectedFailure,
    VerificationFailure,
    UnexpectedFailure,
}

impl fmt::Display for IterationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::ExpectedFailure => write!(f, "expected-failure"),
            Self::VerificationFailure => write!(f, "verification-failure"),
            Self::UnexpectedFailure => write!(f, "unexpected-failure"),
        }
    }
}

/// One iteration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationReport {
    /// 1-based.
    pub iteration: usize,
    pub elapsed: Duration,
    pub outcome: IterationOutcome,
    /// Absent when the scenario could not be run at all.
    pub verdict: Option<Verdict>,
    /// Recorded milestones, for diagnosis.
    pub events: Vec<String>,
    /// Error kind/message or mismatch summary on failure.
    pub detail: Option<String>,
}

/// Aggregate of all iterations run for one scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario: String,
    pub requested: usize,
    pub iterations: Vec<IterationReport>,
}

impl RunReport {
    pub fn new(scenario: impl Into<String>, requested: usize) -> Self {
        Self {
            scenario: scenario.into(),
            requested,
            iterations: Vec::with_capacity(requested),
        }
    }

    pub fn count(&self, outcome: IterationOutcome) -> usize {
        self.iterations
            .iter()
            .filter(|iteration| iteration.outcome == outcome)
            .count()
    }

    pub fn successes(&self) -> usize {
        self.count(IterationOutcome::Success)
    }

    pub fn expected_failures(&self) -> usize {
        self.count(IterationOutcome::ExpectedFailure)
    }

    pub fn verification_failures(&self) -> usize {
        self.count(IterationOutcome::VerificationFailure)
    }

    pub fn unexpected_failures(&self) -> usize {
        self.count(IterationOutcome::UnexpectedFailure)
    }

    /// Every requested iteration ran and none failed.
    pub fn all_passed(&self) -> bool {
        self.iterations.len() == self.requested
            && self.iterations.iter().all(|iteration| {
                matches!(
                    iteration.outcome,
                    IterationOutcome::Success | IterationOutcome::ExpectedFailure
                )
            })
    }

    pub fn total_elapsed(&self) -> Duration {
        self.iterations.iter().map(|iteration| iteration.elapsed).sum()
    }

    pub fn mean_elapsed(&self) -> Duration {
        match self.iterations.len() {
            0 => Duration::ZERO,
            n => self.total_elapsed() / n as u32,
        }
    }
}
