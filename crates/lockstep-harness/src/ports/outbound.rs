//! Outbound port
//!
//! The harness drives storage exclusively through `TransactionStore`,
//! defined in `shared-types` so engines can implement it without depending
//! on the harness.

pub use shared_types::TransactionStore;
