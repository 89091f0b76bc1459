//! # Shared Types Crate
//!
//! Types shared between the storage engine and the interleaving harness.
//!
//! ## Contents
//!
//! - **Entities**: `RowSnapshot`, `Patch`, `TxnId`, `CommitSeq`, isolation
//!   levels, lock modes and engine dialects.
//! - **Errors**: `StoreError`, the error surface of every transactional
//!   operation, and its `ErrorKind` classification.
//! - **Store port**: `TransactionStore`, the contract the harness drives and
//!   an engine implements.

pub mod entities;
pub mod errors;
pub mod store;

pub use entities::*;
pub use errors::*;
pub use store::TransactionStore;
