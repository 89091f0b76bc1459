//! # Lockstep Harness
//!
//! Opens transactions against a shared row, forces a chosen operation
//! ordering between concurrent flows, and verifies both the observed event
//! ordering and the final commit/rollback/error outcome.
//!
//! ## Architecture
//!
//! - **Domain**: `EventRecorder`, `TransactionHandle`, `RowAccessor`,
//!   scenario description (`ScenarioSpec`), signals and results
//! - **Ports**: Inbound (`ScenarioExecutor`) and Outbound (`TransactionStore`)
//! - **Application**: orchestrator, verifier, runner and the built-in catalog
//!
//! ## Data Flow
//!
//! ```text
//! ScenarioRunner ──► ScenarioOrchestrator ──► flows (TransactionHandle × RowAccessor)
//!       ▲                    │                         │
//!       │                    ▼                         ▼
//!       └──── Verdict ◄── OutcomeVerifier ◄── EventRecorder + handle states
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::catalog;
pub use application::orchestrator::ScenarioOrchestrator;
pub use application::runner::ScenarioRunner;
pub use application::verifier::OutcomeVerifier;
pub use config::{CatalogConfig, RunnerConfig};
pub use domain::accessor::RowAccessor;
pub use domain::errors::HarnessError;
pub use domain::events::{EventRecorder, Milestone, Operation, Phase};
pub use domain::handle::TransactionHandle;
pub use domain::outcome::*;
pub use domain::scenario::*;
pub use domain::signals::ScenarioSignals;
pub use ports::inbound::ScenarioExecutor;
pub use ports::outbound::TransactionStore;
