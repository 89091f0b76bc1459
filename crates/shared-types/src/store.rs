//! # Transaction Store Port
//!
//! The contract between the interleaving harness and a transactional engine.
//!
//! Every method is a suspension point. Statements run inside the session of
//! the transaction they name; two transactions are two independent sessions,
//! so their engine-visible effects are concurrent even when the caller drives
//! them from a single thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! let t1 = store.begin(BeginOptions::default()).await?;
//! let row = store.find(t1.id, 1, LockMode::Shared).await?;
//! store.update(t1.id, 1, &Patch::new().set("awesome", true)).await?;
//! store.commit(t1.id).await?;
//! ```

use crate::entities::{BeginOptions, CommitSeq, LockMode, Patch, RowId, RowSnapshot, TxnId, TxnInfo};
use crate::errors::StoreError;
use async_trait::async_trait;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Open a new transaction on its own connection.
    ///
    /// Fails with `StoreError::EngineUnavailable` when no connection is free.
    async fn begin(&self, options: BeginOptions) -> Result<TxnInfo, StoreError>;

    /// Read a row inside `txn`.
    ///
    /// `LockMode::Shared` / `LockMode::Exclusive` place a row lock held until
    /// the transaction ends, waiting first if a conflicting lock is held.
    async fn find(&self, txn: TxnId, row: RowId, lock: LockMode) -> Result<RowSnapshot, StoreError>;

    /// Apply `patch` to a row inside `txn`.
    ///
    /// Waits until the exclusive lock is obtainable. Fails with
    /// `StoreError::DeadlockDetected` if the engine picks `txn` as the victim
    /// of a wait cycle; the transaction is then already rolled back.
    async fn update(&self, txn: TxnId, row: RowId, patch: &Patch) -> Result<(), StoreError>;

    /// Commit `txn`, returning its position in the engine's commit order.
    async fn commit(&self, txn: TxnId) -> Result<CommitSeq, StoreError>;

    /// Roll back `txn`.
    async fn rollback(&self, txn: TxnId) -> Result<(), StoreError>;

    /// Create or reset a row outside of any transaction.
    async fn seed(&self, row: RowSnapshot) -> Result<(), StoreError>;

    /// Number of transactions the engine still holds open.
    async fn active_transactions(&self) -> usize;
}
