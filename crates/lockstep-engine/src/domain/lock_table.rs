//! Row lock table
//!
//! Each row carries the set of granted locks and a FIFO queue of waiting
//! requests. A request conflicts with incompatible locks granted to other
//! transactions and, unless the dialect lets holders upgrade ahead, with
//! incompatible requests queued before it.
//!
//! The table is pure bookkeeping: it never blocks. The engine service owns
//! the wake-up channels and asks the table who became grantable.

use shared_types::{Dialect, RowId, TxnId};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Lock strength held or requested on a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockKind {
    Shared,
    Exclusive,
}

impl LockKind {
    /// Only shared/shared may coexist.
    pub fn compatible_with(self, other: LockKind) -> bool {
        matches!((self, other), (LockKind::Shared, LockKind::Shared))
    }

    /// True when holding `self` already satisfies a request for `requested`.
    pub fn covers(self, requested: LockKind) -> bool {
        self == LockKind::Exclusive || requested == LockKind::Shared
    }
}

/// A queued request.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LockRequest {
    txn: TxnId,
    kind: LockKind,
}

#[derive(Debug, Default)]
struct RowLock {
    granted: BTreeMap<TxnId, LockKind>,
    queue: VecDeque<LockRequest>,
}

impl RowLock {
    fn is_idle(&self) -> bool {
        self.granted.is_empty() && self.queue.is_empty()
    }

    fn conflicting_holders(&self, txn: TxnId, kind: LockKind) -> Vec<TxnId> {
        self.granted
            .iter()
            .filter(|(holder, held)| **holder != txn && !kind.compatible_with(**held))
            .map(|(holder, _)| *holder)
            .collect()
    }

    fn grant(&mut self, txn: TxnId, kind: LockKind) {
        let entry = self.granted.entry(txn).or_insert(kind);
        if !entry.covers(kind) {
            *entry = kind;
        }
    }
}

/// Result of a lock request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// Lock held; the statement may proceed.
    Granted,
    /// Request queued behind `blockers`.
    Waiting { blockers: Vec<TxnId> },
}

/// Lock table for all rows of one engine.
#[derive(Debug)]
pub struct LockTable {
    dialect: Dialect,
    rows: HashMap<RowId, RowLock>,
    /// A session runs one statement at a time, so it waits on at most one row.
    waiting: HashMap<TxnId, RowId>,
}

impl LockTable {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            rows: HashMap::new(),
            waiting: HashMap::new(),
        }
    }

    /// Whether a holder's upgrade skips the queue under this dialect.
    fn upgrade_bypasses_queue(&self, upgrading: bool) -> bool {
        upgrading && self.dialect == Dialect::Postgres
    }

    /// Request `kind` on `row` for `txn`.
    pub fn request(&mut self, txn: TxnId, row: RowId, kind: LockKind) -> Acquire {
        let bypass = self.upgrade_bypasses_queue(self.holds(txn, row).is_some());
        let lock = self.rows.entry(row).or_default();

        if let Some(held) = lock.granted.get(&txn) {
            if held.covers(kind) {
                return Acquire::Granted;
            }
        }

        let mut blockers = lock.conflicting_holders(txn, kind);
        if !bypass {
            for queued in &lock.queue {
                if queued.txn != txn && !kind.compatible_with(queued.kind) && !blockers.contains(&queued.txn) {
                    blockers.push(queued.txn);
                }
            }
        }

        if blockers.is_empty() {
            lock.grant(txn, kind);
            return Acquire::Granted;
        }

        lock.queue.push_back(LockRequest { txn, kind });
        self.waiting.insert(txn, row);
        Acquire::Waiting { blockers }
    }

    /// Grant queued requests on `row` that no longer conflict, in queue order.
    ///
    /// Returns the transactions whose requests were granted.
    pub fn grant_waiters(&mut self, row: RowId) -> Vec<TxnId> {
        let dialect = self.dialect;
        let Some(lock) = self.rows.get_mut(&row) else {
            return Vec::new();
        };

        let queue = std::mem::take(&mut lock.queue);
        let mut still_waiting: VecDeque<LockRequest> = VecDeque::with_capacity(queue.len());
        let mut granted_now = Vec::new();

        for request in queue {
            let holders_clear = lock.conflicting_holders(request.txn, request.kind).is_empty();
            let upgrading = lock.granted.contains_key(&request.txn);
            let queue_clear = (upgrading && dialect == Dialect::Postgres)
                || still_waiting
                    .iter()
                    .all(|ahead| ahead.txn == request.txn || request.kind.compatible_with(ahead.kind));

            if holders_clear && queue_clear {
                lock.grant(request.txn, request.kind);
                granted_now.push(request.txn);
            } else {
                still_waiting.push_back(request);
            }
        }

        lock.queue = still_waiting;
        if lock.is_idle() {
            self.rows.remove(&row);
        }
        for txn in &granted_now {
            self.waiting.remove(txn);
        }
        granted_now
    }

    /// Withdraw the pending request of `txn`, if any. Returns the row it was
    /// waiting on.
    pub fn cancel_wait(&mut self, txn: TxnId) -> Option<RowId> {
        let row = self.waiting.remove(&txn)?;
        if let Some(lock) = self.rows.get_mut(&row) {
            lock.queue.retain(|request| request.txn != txn);
            if lock.is_idle() {
                self.rows.remove(&row);
            }
        }
        Some(row)
    }

    /// Drop every lock and pending request of `txn`.
    ///
    /// Returns the affected rows in ascending order so that re-granting is
    /// deterministic.
    pub fn release_all(&mut self, txn: TxnId) -> Vec<RowId> {
        let mut affected: Vec<RowId> = self.cancel_wait(txn).into_iter().collect();

        for (row, lock) in self.rows.iter_mut() {
            if lock.granted.remove(&txn).is_some() {
                affected.push(*row);
            }
        }
        self.rows.retain(|_, lock| !lock.is_idle());

        affected.sort_unstable();
        affected.dedup();
        affected
    }

    /// Wait-for edges: each waiting transaction points at the transactions
    /// blocking its queued request.
    pub fn wait_for_graph(&self) -> HashMap<TxnId, Vec<TxnId>> {
        let mut graph: HashMap<TxnId, Vec<TxnId>> = HashMap::new();

        for lock in self.rows.values() {
            for (position, request) in lock.queue.iter().enumerate() {
                let mut edges = lock.conflicting_holders(request.txn, request.kind);
                let upgrading = lock.granted.contains_key(&request.txn);

                if !self.upgrade_bypasses_queue(upgrading) {
                    for ahead in lock.queue.iter().take(position) {
                        if ahead.txn != request.txn
                            && !request.kind.compatible_with(ahead.kind)
                            && !edges.contains(&ahead.txn)
                        {
                            edges.push(ahead.txn);
                        }
                    }
                }

                graph.entry(request.txn).or_default().extend(edges);
            }
        }

        graph
    }

    /// Lock `txn` holds on `row`.
    pub fn holds(&self, txn: TxnId, row: RowId) -> Option<LockKind> {
        self.rows.get(&row).and_then(|lock| lock.granted.get(&txn).copied())
    }

    /// Number of rows `txn` holds a lock on.
    pub fn held_count(&self, txn: TxnId) -> usize {
        self.rows
            .values()
            .filter(|lock| lock.granted.contains_key(&txn))
            .count()
    }

    pub fn is_waiting(&self, txn: TxnId) -> bool {
        self.waiting.contains_key(&txn)
    }

    pub fn waiting_on(&self, txn: TxnId) -> Option<RowId> {
        self.waiting.get(&txn).copied()
    }
}
