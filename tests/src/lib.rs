//! # Lockstep Test Suite
//!
//! Cross-crate tests driving the harness against the in-memory engine.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/              # Criterion benchmarks (lock table, cycle search, scenarios)
//! └── src/integration/
//!     ├── support.rs        # Engine/orchestrator/runner fixtures
//!     ├── contention.rs     # Writer serialization behind a shared lock
//!     ├── deadlock.rs       # Upgrade deadlock, repeated runs, wrong error identity
//!     ├── orderings.rs      # Reference orderings, JSON-described scenarios
//!     └── cleanup.rs        # Terminal states, idempotent rollback, setup failures
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p lockstep-tests
//!
//! # By module
//! cargo test -p lockstep-tests integration::deadlock::
//!
//! # Benchmarks
//! cargo bench -p lockstep-tests
//! ```

pub mod integration;
