//! # Transaction Handle
//!
//! One transaction's lifecycle as seen by the harness.
//!
//! ```text
//!            commit()
//!   Active ───────────► Committed
//!     │
//!     │ rollback() / engine deadlock abort
//!     ▼
//!   RolledBack
//! ```
//!
//! Transitions are one-way. Once terminal, every operation fails with
//! `StoreError::AlreadyFinished` without reaching the engine.

use parking_lot::Mutex;
use shared_types::{
    BeginOptions, CommitSeq, IsolationLevel, LockMode, Patch, RowId, RowSnapshot, StoreError,
    TransactionStore, TxnId, TxnStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::scenario::TxnLabel;

#[derive(Debug)]
struct HandleState {
    status: TxnStatus,
    commit_seq: Option<CommitSeq>,
    aborted_by_engine: bool,
}

/// An open (or finished) transaction bound to one engine session.
pub struct TransactionHandle {
    label: TxnLabel,
    id: TxnId,
    isolation_level: IsolationLevel,
    lock_mode: LockMode,
    started_at: Instant,
    first_read_done: AtomicBool,
    state: Mutex<HandleState>,
    store: Arc<dyn TransactionStore>,
}

impl TransactionHandle {
    /// Open a transaction.
    ///
    /// `lock_mode` applies to the first successful read only; later reads
    /// are plain.
    pub async fn begin(
        store: Arc<dyn TransactionStore>,
        label: TxnLabel,
        isolation_level: Option<IsolationLevel>,
        lock_mode: LockMode,
    ) -> Result<Self, StoreError> {
        let info = store.begin(BeginOptions { isolation_level }).await?;
        debug!(%label, txn = %info.id, isolation = %info.isolation_level, %lock_mode, "Transaction begun");

        Ok(Self {
            label,
            id: info.id,
            isolation_level: info.isolation_level,
            lock_mode,
            started_at: Instant::now(),
            first_read_done: AtomicBool::new(false),
            state: Mutex::new(HandleState {
                status: TxnStatus::Active,
                commit_seq: None,
                aborted_by_engine: false,
            }),
            store,
        })
    }

    pub fn label(&self) -> &TxnLabel {
        &self.label
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn status(&self) -> TxnStatus {
        self.state.lock().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Engine commit sequence, once committed.
    pub fn commit_seq(&self) -> Option<CommitSeq> {
        self.state.lock().commit_seq
    }

    /// True when the engine rolled this transaction back to break a deadlock.
    pub fn aborted_by_engine(&self) -> bool {
        self.state.lock().aborted_by_engine
    }

    /// Read `row` inside this transaction.
    pub async fn read(&self, row: RowId) -> Result<RowSnapshot, StoreError> {
        self.ensure_active()?;
        let lock = if self.first_read_done.load(Ordering::Acquire) {
            LockMode::None
        } else {
            self.lock_mode
        };

        let snapshot = self.observe(self.store.find(self.id, row, lock).await)?;
        // A failed first read keeps the lock mode for the retry.
        self.first_read_done.store(true, Ordering::Release);
        Ok(snapshot)
    }

    /// Apply `patch` to `row`, waiting for the exclusive lock.
    pub async fn write(&self, row: RowId, patch: &Patch) -> Result<(), StoreError> {
        self.ensure_active()?;
        let result = self.store.update(self.id, row, patch).await;
        self.observe(result)
    }

    pub async fn commit(&self) -> Result<CommitSeq, StoreError> {
        self.ensure_active()?;
        let seq = self.observe(self.store.commit(self.id).await)?;

        let mut state = self.state.lock();
        if state.status == TxnStatus::Active {
            state.status = TxnStatus::Committed;
            state.commit_seq = Some(seq);
        }
        Ok(seq)
    }

    /// Roll back. On a terminal handle this fails with `AlreadyFinished`
    /// and leaves the state untouched.
    pub async fn rollback(&self) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.observe(self.store.rollback(self.id).await)?;
        self.transition(TxnStatus::RolledBack);
        Ok(())
    }

    /// Best-effort rollback for cleanup paths. Never fails; returns whether
    /// this call rolled the transaction back.
    pub async fn rollback_quietly(&self) -> bool {
        match self.rollback().await {
            Ok(()) => true,
            Err(StoreError::AlreadyFinished { status, .. }) => {
                debug!(label = %self.label, %status, "Rollback skipped, transaction already finished");
                false
            }
            Err(e) => {
                warn!(label = %self.label, error = %e, "Suppressed rollback failure");
                false
            }
        }
    }

    fn ensure_active(&self) -> Result<(), StoreError> {
        let status = self.status();
        if status.is_terminal() {
            return Err(StoreError::AlreadyFinished { txn: self.id, status });
        }
        Ok(())
    }

    /// Fold engine-side terminations into the handle's state.
    fn observe<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(e) = &result {
            match e {
                StoreError::DeadlockDetected => {
                    let mut state = self.state.lock();
                    if state.status == TxnStatus::Active {
                        state.status = TxnStatus::RolledBack;
                        state.aborted_by_engine = true;
                    }
                }
                StoreError::AlreadyFinished { status, .. } => self.transition(*status),
                _ => {}
            }
        }
        result
    }

    fn transition(&self, to: TxnStatus) {
        let mut state = self.state.lock();
        if state.status == TxnStatus::Active && to.is_terminal() {
            state.status = to;
        }
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("label", &self.label)
            .field("id", &self.id)
            .field("isolation_level", &self.isolation_level)
            .field("lock_mode", &self.lock_mode)
            .field("state", &*self.state.lock())
            .finish()
    }
}
