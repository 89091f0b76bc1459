//! Configuration for the runner and the built-in scenarios.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Runner configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Sequential repetitions of the scenario
    pub iterations: usize,
    /// Pause between iterations so released connections settle (milliseconds)
    pub settle_delay_ms: u64,
    /// Abort the run on the first verification failure as well
    pub stop_on_verification_failure: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            settle_delay_ms: 100,
            stop_on_verification_failure: false,
        }
    }
}

impl RunnerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOCKSTEP_ITERATIONS`: repetitions (default: 10)
    /// - `LOCKSTEP_SETTLE_DELAY_MS`: pause between iterations (default: 100)
    /// - `LOCKSTEP_STRICT`: verification failures abort the run (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            iterations: env::var("LOCKSTEP_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.iterations),

            settle_delay_ms: env::var("LOCKSTEP_SETTLE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.settle_delay_ms),

            stop_on_verification_failure: env::var("LOCKSTEP_STRICT")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.stop_on_verification_failure),
        }
    }
}

/// Timing of the built-in scenarios
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// How long the lock holder waits before its own write (milliseconds)
    pub writer_delay_ms: u64,
    /// How long the lock holder keeps its write uncommitted (milliseconds)
    pub hold_delay_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            writer_delay_ms: 500,
            hold_delay_ms: 2_000,
        }
    }
}

impl CatalogConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOCKSTEP_WRITER_DELAY_MS` (default: 500)
    /// - `LOCKSTEP_HOLD_DELAY_MS` (default: 2000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            writer_delay_ms: env::var("LOCKSTEP_WRITER_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.writer_delay_ms),

            hold_delay_ms: env::var("LOCKSTEP_HOLD_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.hold_delay_ms),
        }
    }
}
