//! # Error Types
//!
//! The error surface of every transactional operation.

use crate::entities::{RowId, TxnId, TxnStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message carried by the engine's deadlock error. Verified verbatim.
pub const DEADLOCK_MESSAGE: &str =
    "Deadlock found when trying to get lock; try restarting transaction";

/// Errors returned by a `TransactionStore`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No connection could be obtained for a new transaction.
    #[error("Engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    /// The engine aborted this transaction to break a wait cycle.
    /// The transaction is already rolled back.
    #[error("{}", DEADLOCK_MESSAGE)]
    DeadlockDetected,

    /// Commit/rollback/statement issued against a terminal transaction.
    #[error("Transaction {txn} already finished ({status})")]
    AlreadyFinished { txn: TxnId, status: TxnStatus },

    /// A lock wait exceeded the engine's timeout. The statement fails; the
    /// transaction stays active.
    #[error("Lock wait timeout exceeded for {txn} on row {row} after {waited_ms}ms; try restarting transaction")]
    LockWaitTimeout {
        txn: TxnId,
        row: RowId,
        waited_ms: u64,
    },

    /// Row does not exist.
    #[error("Row not found: {0}")]
    RowNotFound(RowId),

    /// Transaction id unknown to the engine.
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxnId),

    /// Any other engine failure.
    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EngineUnavailable { .. } => ErrorKind::Unavailable,
            Self::DeadlockDetected => ErrorKind::Deadlock,
            Self::AlreadyFinished { .. } => ErrorKind::AlreadyFinished,
            Self::LockWaitTimeout { .. } => ErrorKind::LockTimeout,
            Self::RowNotFound(_) => ErrorKind::NotFound,
            Self::UnknownTransaction(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::DeadlockDetected)
    }

    /// True when the failure ended the transaction on the engine side.
    pub fn terminates_transaction(&self) -> bool {
        matches!(self, Self::DeadlockDetected | Self::AlreadyFinished { .. })
    }
}

/// Coarse classification of a `StoreError`, used in milestones and verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Deadlock,
    AlreadyFinished,
    Unavailable,
    LockTimeout,
    NotFound,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadlock => write!(f, "deadlock"),
            Self::AlreadyFinished => write!(f, "already-finished"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::LockTimeout => write!(f, "lock-timeout"),
            Self::NotFound => write!(f, "not-found"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
