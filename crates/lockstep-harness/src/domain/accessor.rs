//! Row accessor
//!
//! A view of one row through one transaction. Holds no state of its own;
//! two accessors for the same row under different transactions may coexist,
//! and one may block the other depending on the locks their handles hold.

use crate::domain::handle::TransactionHandle;
use shared_types::{CommitSeq, Patch, RowId, RowSnapshot, StoreError};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RowAccessor {
    row: RowId,
    handle: Arc<TransactionHandle>,
}

impl RowAccessor {
    pub fn new(row: RowId, handle: Arc<TransactionHandle>) -> Self {
        Self { row, handle }
    }

    pub fn row_id(&self) -> RowId {
        self.row
    }

    pub fn transaction(&self) -> &Arc<TransactionHandle> {
        &self.handle
    }

    pub async fn read(&self) -> Result<RowSnapshot, StoreError> {
        self.handle.read(self.row).await
    }

    pub async fn write(&self, patch: &Patch) -> Result<(), StoreError> {
        self.handle.write(self.row, patch).await
    }

    /// Commit the underlying transaction.
    pub async fn commit(&self) -> Result<CommitSeq, StoreError> {
        self.handle.commit().await
    }

    /// Roll back the underlying transaction.
    pub async fn rollback(&self) -> Result<(), StoreError> {
        self.handle.rollback().await
    }
}
