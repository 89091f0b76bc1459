//! # Outcome Verifier
//!
//! Judges a `ScenarioResult` against the scenario's `Expectation`.
//!
//! Checks, in order of severity:
//!
//! 1. **Transactional**: every flow failure must be the declared expected
//!    failure (same owner, kind and exact message), and a declared expected
//!    failure must occur on at least one flow of its owner. Any violation
//!    yields `Verdict::TransactionalFailure`.
//! 2. **Verification**: the milestone sequence equals one reference ordering
//!    element for element; every transaction ends in its expected terminal
//!    state; the engine commit order matches when declared; no transaction
//!    is left open. Violations yield `Verdict::VerificationFailed`.
//!
//! Observer order and engine commit order are separate properties: an
//! alternate reference ordering can pass while the commit-order check fails.

use crate::domain::outcome::{Mismatch, ScenarioResult, TransactionalFailure, Verdict};
use crate::domain::scenario::Expectation;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeVerifier;

impl OutcomeVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, expectation: &Expectation, result: &ScenarioResult) -> Verdict {
        let failures = self.transactional_failures(expectation, result);
        if !failures.is_empty() {
            return Verdict::TransactionalFailure { failures };
        }

        let events = result.events();
        let matched = match_reference(&events, &expectation.reference_orderings);
        let mut mismatches = Vec::new();

        if matched.is_none() {
            mismatches.push(Mismatch::Ordering {
                actual: events,
                candidates: expectation.reference_orderings.clone(),
            });
        }

        for (txn, expected) in &expectation.final_states {
            let actual = result.transactions.get(txn).map(|report| report.status);
            if actual != Some(*expected) {
                mismatches.push(Mismatch::TerminalState {
                    txn: txn.clone(),
                    expected: *expected,
                    actual,
                });
            }
        }
        // No transaction may outlive the scenario, declared or not.
        for (txn, report) in &result.transactions {
            if !report.status.is_terminal() && !expectation.final_states.contains_key(txn) {
                mismatches.push(Mismatch::TerminalState {
                    txn: txn.clone(),
                    expected: shared_types::TxnStatus::RolledBack,
                    actual: Some(report.status),
                });
            }
        }

        if let Some(expected) = &expectation.commit_order {
            let actual = result.commit_order();
            if &actual != expected {
                mismatches.push(Mismatch::CommitOrder {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        if result.leaked > 0 {
            mismatches.push(Mismatch::LeakedTransactions { count: result.leaked });
        }

        match (matched, mismatches.is_empty()) {
            (Some(matched_reference), true) => {
                debug!(matched_reference, "Scenario verified");
                Verdict::Passed {
                    matched_reference,
                    expected_failure: expectation.expected_failure.is_some(),
                }
            }
            _ => Verdict::VerificationFailed { mismatches },
        }
    }

    fn transactional_failures(
        &self,
        expectation: &Expectation,
        result: &ScenarioResult,
    ) -> Vec<TransactionalFailure> {
        let expected = expectation.expected_failure.as_ref();
        let mut failures = Vec::new();
        let mut satisfied = false;

        for flow in &result.flows {
            let Some(actual) = flow.outcome.failure() else {
                continue;
            };
            match expected.filter(|declared| declared.flow == flow.owner) {
                Some(declared) if actual.kind == declared.kind && actual.message == declared.message => {
                    satisfied = true;
                }
                Some(declared) => failures.push(TransactionalFailure::WrongFailure {
                    flow: flow.owner.clone(),
                    expected_kind: declared.kind,
                    expected_message: declared.message.clone(),
                    failure: actual.clone(),
                }),
                None => failures.push(TransactionalFailure::Unexpected {
                    flow: flow.owner.clone(),
                    failure: actual.clone(),
                }),
            }
        }

        // Judged per owner: any one of its flows may carry the declared failure.
        if let Some(declared) = expected {
            let reported = failures.iter().any(|failure| {
                matches!(failure, TransactionalFailure::WrongFailure { flow, .. } if flow == &declared.flow)
            });
            if !satisfied && !reported {
                failures.push(TransactionalFailure::MissingExpectedFailure {
                    flow: declared.flow.clone(),
                });
            }
        }

        failures
    }
}

/// Index of the first reference equal to `events`.
pub fn match_reference(events: &[String], references: &[Vec<String>]) -> Option<usize> {
    references.iter().position(|reference| reference.as_slice() == events)
}
