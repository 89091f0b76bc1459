//! # Lockstep Engine
//!
//! An in-memory transactional engine with pessimistic row locking, used as
//! the storage collaborator behind the interleaving harness.
//!
//! ## Architecture
//!
//! - **Domain**: lock table (granted set + FIFO wait queue per row),
//!   wait-for graph cycle search and victim selection, per-transaction
//!   visibility rules.
//! - **Service**: `InMemoryEngine`, implementing `shared_types::TransactionStore`.
//! - **Config**: `EngineConfig` (dialect, connection limit, lock-wait timeout,
//!   deadlock detection switch).
//!
//! ## Dialects
//!
//! The dialects differ only in how a shared-lock holder's upgrade is queued:
//!
//! ```text
//! T1: FOR SHARE (granted S)      T2: UPDATE (waits X behind T1's S)
//! T1: UPDATE (requests X)
//!
//!   mysql    → T1 also waits behind T2's queued X → cycle → T2 aborted
//!   postgres → T1 upgrades ahead of T2            → T1 proceeds, T2 waits
//! ```

pub mod config;
pub mod domain;
pub mod service;

pub use config::EngineConfig;
pub use domain::lock_table::{Acquire, LockKind, LockTable};
pub use domain::wait_for::{choose_victim, find_cycle};
pub use service::InMemoryEngine;
