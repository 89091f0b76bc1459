//! Configuration for the in-memory engine.

use serde::{Deserialize, Serialize};
use shared_types::Dialect;
use std::env;
use std::time::Duration;

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lock-upgrade policy and default isolation
    pub dialect: Dialect,
    /// Maximum concurrently open transactions (one connection each)
    pub max_connections: usize,
    /// Lock wait backstop (milliseconds)
    pub lock_wait_timeout_ms: u64,
    /// Search the wait-for graph whenever a request has to wait
    pub deadlock_detection: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Mysql,
            max_connections: 10,
            lock_wait_timeout_ms: 5_000,
            deadlock_detection: true,
        }
    }
}

impl EngineConfig {
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOCKSTEP_DIALECT`: mysql | postgres (default: mysql)
    /// - `LOCKSTEP_MAX_CONNECTIONS`: connection limit (default: 10)
    /// - `LOCKSTEP_LOCK_WAIT_TIMEOUT_MS`: lock wait backstop (default: 5000)
    /// - `LOCKSTEP_DEADLOCK_DETECTION`: enable detection (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            dialect: env::var("LOCKSTEP_DIALECT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.dialect),

            max_connections: env::var("LOCKSTEP_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),

            lock_wait_timeout_ms: env::var("LOCKSTEP_LOCK_WAIT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lock_wait_timeout_ms),

            deadlock_detection: env::var("LOCKSTEP_DEADLOCK_DETECTION")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.deadlock_detection),
        }
    }
}
