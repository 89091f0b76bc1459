//! In-memory engine service
//!
//! Implements `TransactionStore` over the lock table and visibility rules.
//! All bookkeeping happens under one mutex; a statement that has to wait
//! parks on a oneshot channel outside the mutex and is woken by whichever
//! commit, rollback, timeout or deadlock resolution makes it grantable (or
//! picks it as the victim).

use crate::config::EngineConfig;
use crate::domain::lock_table::{Acquire, LockKind, LockTable};
use crate::domain::visibility::{FinishedTxn, TxnRecord};
use crate::domain::wait_for::{choose_victim, find_cycle};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    Attributes, BeginOptions, CommitSeq, LockMode, Patch, RowId, RowSnapshot, StoreError,
    TransactionStore, TxnId, TxnInfo, TxnStatus,
};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Wakeup = oneshot::Sender<Result<(), StoreError>>;

/// In-memory pessimistic-locking engine.
pub struct InMemoryEngine {
    config: EngineConfig,
    state: Mutex<EngineState>,
}

struct EngineState {
    closed: bool,
    next_txn: u64,
    next_commit: u64,
    open_connections: usize,
    deadlocks: u64,
    rows: HashMap<RowId, Attributes>,
    /// Open transactions only.
    txns: HashMap<TxnId, TxnRecord>,
    finished: HashMap<TxnId, FinishedTxn>,
    locks: LockTable,
    wakeups: HashMap<TxnId, Wakeup>,
    commit_log: Vec<TxnId>,
}

impl InMemoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let state = EngineState {
            closed: false,
            next_txn: 0,
            next_commit: 0,
            open_connections: 0,
            deadlocks: 0,
            rows: HashMap::new(),
            txns: HashMap::new(),
            finished: HashMap::new(),
            locks: LockTable::new(config.dialect),
            wakeups: HashMap::new(),
            commit_log: Vec::new(),
        };

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Refuse new transactions from now on. Open ones keep running.
    pub fn close(&self) {
        self.state.lock().closed = true;
        info!("Engine closed to new transactions");
    }

    /// Latest committed image of a row.
    pub fn committed_row(&self, row: RowId) -> Option<RowSnapshot> {
        self.state.lock().rows.get(&row).map(|attributes| RowSnapshot {
            id: row,
            attributes: attributes.clone(),
        })
    }

    /// Transactions in the order they committed.
    pub fn commit_log(&self) -> Vec<TxnId> {
        self.state.lock().commit_log.clone()
    }

    /// Number of deadlocks resolved so far.
    pub fn deadlock_count(&self) -> u64 {
        self.state.lock().deadlocks
    }

    pub fn status_of(&self, txn: TxnId) -> Option<TxnStatus> {
        let state = self.state.lock();
        if state.txns.contains_key(&txn) {
            return Some(TxnStatus::Active);
        }
        state.finished.get(&txn).map(|finished| finished.status)
    }

    /// Whether the engine, rather than the client, rolled `txn` back.
    pub fn aborted_by_engine(&self, txn: TxnId) -> bool {
        let state = self.state.lock();
        match state.txns.get(&txn) {
            Some(record) => record.aborted_by_engine,
            None => state
                .finished
                .get(&txn)
                .map(|finished| finished.aborted_by_engine)
                .unwrap_or(false),
        }
    }

    /// Obtain `kind` on `row` for `txn`, waiting if necessary.
    async fn acquire(&self, txn: TxnId, row: RowId, kind: LockKind) -> Result<(), StoreError> {
        let pending = {
            let mut state = self.state.lock();
            state.ensure_active(txn)?;
            if state.locks.is_waiting(txn) {
                return Err(StoreError::Internal(format!(
                    "{txn} already has a statement in progress"
                )));
            }

            match state.locks.request(txn, row, kind) {
                Acquire::Granted => {
                    debug!(%txn, row, ?kind, "Lock granted");
                    None
                }
                Acquire::Waiting { blockers } => {
                    debug!(%txn, row, ?kind, ?blockers, "Lock wait");
                    let (tx, rx) = oneshot::channel();
                    state.wakeups.insert(txn, tx);
                    if self.config.deadlock_detection {
                        state.resolve_deadlocks(txn);
                    }
                    Some(rx)
                }
            }
        };

        let Some(mut rx) = pending else {
            return Ok(());
        };

        match tokio::time::timeout(self.config.lock_wait_timeout(), &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(StoreError::Internal(format!("lock wait of {txn} abandoned"))),
            Err(_) => {
                let timed_out = {
                    let mut state = self.state.lock();
                    let cancelled = state.locks.cancel_wait(txn).is_some();
                    if cancelled {
                        state.wakeups.remove(&txn);
                        state.wake_granted(row);
                    }
                    cancelled
                };
                if timed_out {
                    warn!(%txn, row, timeout_ms = self.config.lock_wait_timeout_ms, "Lock wait timeout");
                    return Err(StoreError::LockWaitTimeout {
                        txn,
                        row,
                        waited_ms: self.config.lock_wait_timeout_ms,
                    });
                }
                // Resolved concurrently with the timer; the outcome is already sent.
                rx.await
                    .unwrap_or_else(|_| Err(StoreError::Internal(format!("lock wait of {txn} abandoned"))))
            }
        }
    }
}

impl EngineState {
    fn ensure_active(&mut self, txn: TxnId) -> Result<&mut TxnRecord, StoreError> {
        let Self { txns, finished, .. } = self;
        txns.get_mut(&txn).ok_or_else(|| not_open(finished, txn))
    }

    fn ensure_row(&self, row: RowId) -> Result<(), StoreError> {
        if self.rows.contains_key(&row) {
            Ok(())
        } else {
            Err(StoreError::RowNotFound(row))
        }
    }

    /// Wake every request on `row` that became grantable.
    fn wake_granted(&mut self, row: RowId) {
        for txn in self.locks.grant_waiters(row) {
            debug!(%txn, row, "Lock granted after wait");
            if let Some(wakeup) = self.wakeups.remove(&txn) {
                let _ = wakeup.send(Ok(()));
            }
        }
    }

    /// Move `txn` to a terminal state, release its locks and connection.
    fn finish(&mut self, txn: TxnId, status: TxnStatus) {
        if let Some(record) = self.txns.remove(&txn) {
            self.finished.insert(txn, record.into_finished(status));
        }
        // A statement still waiting on behalf of this transaction ends with it.
        if let Some(wakeup) = self.wakeups.remove(&txn) {
            let _ = wakeup.send(Err(StoreError::AlreadyFinished { txn, status }));
        }
        self.open_connections = self.open_connections.saturating_sub(1);
        for row in self.locks.release_all(txn) {
            self.wake_granted(row);
        }
    }

    /// Break every wait cycle through `requester` by rolling back victims.
    fn resolve_deadlocks(&mut self, requester: TxnId) {
        loop {
            let graph = self.locks.wait_for_graph();
            let Some(cycle) = find_cycle(&graph, requester) else {
                break;
            };

            let weights: HashMap<TxnId, usize> = cycle
                .iter()
                .map(|txn| {
                    let writes = self.txns.get(txn).map(TxnRecord::write_count).unwrap_or(0);
                    (*txn, self.locks.held_count(*txn) + writes)
                })
                .collect();
            let Some(victim) = choose_victim(&cycle, |txn| weights.get(&txn).copied().unwrap_or(0)) else {
                break;
            };

            warn!(%victim, ?cycle, "Deadlock detected, rolling back victim");
            self.deadlocks += 1;
            if let Some(record) = self.txns.get_mut(&victim) {
                record.aborted_by_engine = true;
            }
            let wakeup = self.wakeups.remove(&victim);
            self.finish(victim, TxnStatus::RolledBack);
            if let Some(wakeup) = wakeup {
                let _ = wakeup.send(Err(StoreError::DeadlockDetected));
            }

            if victim == requester {
                break;
            }
        }
    }

    /// Image another active transaction has written to `row`.
    fn dirty_image(&self, reader: TxnId, row: RowId) -> Option<Attributes> {
        self.txns
            .values()
            .filter(|record| record.id != reader)
            .find_map(|record| record.pending_write(row).cloned())
    }
}

/// Error for a statement against a transaction that is not open.
fn not_open(finished: &HashMap<TxnId, FinishedTxn>, txn: TxnId) -> StoreError {
    match finished.get(&txn) {
        Some(finished) => StoreError::AlreadyFinished {
            txn,
            status: finished.status,
        },
        None => StoreError::UnknownTransaction(txn),
    }
}

#[async_trait]
impl TransactionStore for InMemoryEngine {
    async fn begin(&self, options: BeginOptions) -> Result<TxnInfo, StoreError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(StoreError::EngineUnavailable {
                reason: "engine closed".to_string(),
            });
        }
        if state.open_connections >= self.config.max_connections {
            return Err(StoreError::EngineUnavailable {
                reason: format!(
                    "connection pool exhausted ({} in use)",
                    self.config.max_connections
                ),
            });
        }

        state.next_txn += 1;
        let id = TxnId(state.next_txn);
        let isolation_level = options
            .isolation_level
            .unwrap_or_else(|| self.config.dialect.default_isolation());

        state.txns.insert(id, TxnRecord::new(id, isolation_level));
        state.open_connections += 1;
        debug!(txn = %id, %isolation_level, "Transaction started");

        Ok(TxnInfo {
            id,
            isolation_level,
        })
    }

    async fn find(&self, txn: TxnId, row: RowId, lock: LockMode) -> Result<RowSnapshot, StoreError> {
        let kind = {
            let mut state = self.state.lock();
            let plain_reads_lock = state.ensure_active(txn)?.plain_reads_lock();
            state.ensure_row(row)?;

            match lock {
                LockMode::Shared => LockKind::Shared,
                LockMode::Exclusive => LockKind::Exclusive,
                LockMode::None if plain_reads_lock => LockKind::Shared,
                LockMode::None => {
                    let dirty = state.dirty_image(txn, row);
                    let EngineState { rows, txns, .. } = &mut *state;
                    let record = txns.get_mut(&txn).ok_or(StoreError::UnknownTransaction(txn))?;
                    let attributes = record
                        .plain_read(row, rows, dirty.as_ref())
                        .ok_or(StoreError::RowNotFound(row))?;
                    return Ok(RowSnapshot { id: row, attributes });
                }
            }
        };

        self.acquire(txn, row, kind).await?;

        let state = self.state.lock();
        let record = state
            .txns
            .get(&txn)
            .ok_or_else(|| not_open(&state.finished, txn))?;
        let attributes = record
            .locking_read(row, &state.rows)
            .ok_or(StoreError::RowNotFound(row))?;
        Ok(RowSnapshot { id: row, attributes })
    }

    async fn update(&self, txn: TxnId, row: RowId, patch: &Patch) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock();
            state.ensure_active(txn)?;
            state.ensure_row(row)?;
        }

        self.acquire(txn, row, LockKind::Exclusive).await?;

        let mut state = self.state.lock();
        let EngineState {
            rows,
            txns,
            finished,
            ..
        } = &mut *state;
        let record = txns.get_mut(&txn).ok_or_else(|| not_open(finished, txn))?;
        let base = record
            .locking_read(row, rows)
            .ok_or(StoreError::RowNotFound(row))?;
        record.buffer_write(row, patch.apply_to(&base));
        debug!(%txn, row, "Row updated");
        Ok(())
    }

    async fn commit(&self, txn: TxnId) -> Result<CommitSeq, StoreError> {
        let mut state = self.state.lock();
        state.ensure_active(txn)?;
        if state.locks.is_waiting(txn) {
            return Err(StoreError::Internal(format!(
                "{txn} cannot commit while a statement is waiting"
            )));
        }

        let writes = state
            .txns
            .get_mut(&txn)
            .map(TxnRecord::take_writes)
            .unwrap_or_default();
        for (row, image) in writes {
            state.rows.insert(row, image);
        }

        state.next_commit += 1;
        let seq = CommitSeq(state.next_commit);
        state.commit_log.push(txn);
        state.finish(txn, TxnStatus::Committed);
        debug!(%txn, seq = seq.0, "Transaction committed");

        Ok(seq)
    }

    async fn rollback(&self, txn: TxnId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.ensure_active(txn)?;
        state.finish(txn, TxnStatus::RolledBack);
        debug!(%txn, "Transaction rolled back");
        Ok(())
    }

    async fn seed(&self, row: RowSnapshot) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        debug!(row = row.id, "Row seeded");
        state.rows.insert(row.id, row.attributes);
        Ok(())
    }

    async fn active_transactions(&self) -> usize {
        self.state.lock().open_connections
    }
}
