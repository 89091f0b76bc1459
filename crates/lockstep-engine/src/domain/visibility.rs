//! Per-transaction state and read visibility
//!
//! Writes are buffered per transaction and published on commit. What a plain
//! read returns depends on the isolation level; locking reads always see the
//! latest committed image (or the transaction's own write).

use shared_types::{Attributes, IsolationLevel, RowId, TxnId, TxnStatus};
use std::collections::{BTreeMap, HashMap};

/// What the engine keeps of a transaction once it has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedTxn {
    pub status: TxnStatus,
    pub aborted_by_engine: bool,
}

/// Engine-side record of one open transaction.
#[derive(Debug)]
pub struct TxnRecord {
    pub id: TxnId,
    pub isolation: IsolationLevel,
    /// Rolled back by the deadlock detector rather than the client.
    pub aborted_by_engine: bool,
    /// Uncommitted row images written by this transaction.
    writes: BTreeMap<RowId, Attributes>,
    /// Repeatable-read view, taken at the first plain read.
    read_view: Option<HashMap<RowId, Attributes>>,
}

impl TxnRecord {
    pub fn new(id: TxnId, isolation: IsolationLevel) -> Self {
        Self {
            id,
            isolation,
            aborted_by_engine: false,
            writes: BTreeMap::new(),
            read_view: None,
        }
    }

    /// Serializable plain reads behave like shared-locking reads.
    pub fn plain_reads_lock(&self) -> bool {
        self.isolation == IsolationLevel::Serializable
    }

    /// Rows written so far.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    pub fn pending_write(&self, row: RowId) -> Option<&Attributes> {
        self.writes.get(&row)
    }

    pub fn buffer_write(&mut self, row: RowId, image: Attributes) {
        self.writes.insert(row, image);
    }

    /// Hand over the write set for publication and forget it.
    pub fn take_writes(&mut self) -> BTreeMap<RowId, Attributes> {
        std::mem::take(&mut self.writes)
    }

    /// Drop the buffered state, keeping only the outcome.
    pub fn into_finished(self, status: TxnStatus) -> FinishedTxn {
        FinishedTxn {
            status,
            aborted_by_engine: self.aborted_by_engine,
        }
    }

    /// Resolve a non-locking read.
    ///
    /// `uncommitted` is the image another active transaction has written to
    /// the row, consulted only under read-uncommitted.
    pub fn plain_read(
        &mut self,
        row: RowId,
        committed: &HashMap<RowId, Attributes>,
        uncommitted: Option<&Attributes>,
    ) -> Option<Attributes> {
        if let Some(own) = self.writes.get(&row) {
            return Some(own.clone());
        }

        match self.isolation {
            IsolationLevel::ReadUncommitted => uncommitted.or_else(|| committed.get(&row)).cloned(),
            IsolationLevel::ReadCommitted | IsolationLevel::Serializable => committed.get(&row).cloned(),
            IsolationLevel::RepeatableRead => self
                .read_view
                .get_or_insert_with(|| committed.clone())
                .get(&row)
                .cloned(),
        }
    }

    /// Resolve a read performed while holding a row lock.
    pub fn locking_read(&self, row: RowId, committed: &HashMap<RowId, Attributes>) -> Option<Attributes> {
        self.writes
            .get(&row)
            .or_else(|| committed.get(&row))
            .cloned()
    }
}
