//! Cooperative per-scenario signals
//!
//! Flows share these flags by reference. They are best-effort: a flow reads
//! them before issuing its next statement, so it may still perform one
//! operation after another flow has set a flag.

use crate::domain::scenario::TxnLabel;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct TxnSignals {
    /// The transaction reached committed or rolled-back.
    terminal: AtomicBool,
    /// A flow has issued commit for the transaction.
    committing: AtomicBool,
}

/// Named flags for every transaction of one scenario run.
#[derive(Debug, Default)]
pub struct ScenarioSignals {
    txns: HashMap<TxnLabel, TxnSignals>,
}

impl ScenarioSignals {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a TxnLabel>) -> Self {
        Self {
            txns: labels
                .into_iter()
                .map(|label| (label.clone(), TxnSignals::default()))
                .collect(),
        }
    }

    pub fn mark_terminal(&self, txn: &TxnLabel) {
        if let Some(signals) = self.txns.get(txn) {
            signals.terminal.store(true, Ordering::Release);
        }
    }

    pub fn is_terminal(&self, txn: &TxnLabel) -> bool {
        self.txns
            .get(txn)
            .map(|signals| signals.terminal.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn mark_committing(&self, txn: &TxnLabel) {
        if let Some(signals) = self.txns.get(txn) {
            signals.committing.store(true, Ordering::Release);
        }
    }

    pub fn is_committing(&self, txn: &TxnLabel) -> bool {
        self.txns
            .get(txn)
            .map(|signals| signals.committing.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}
