//! # Lockstep Telemetry
//!
//! Structured logging for the harness, the engine and the CLI.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lockstep_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(TelemetryConfig::from_env())?;
//!     // Scenario runs now log through the installed subscriber
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOCKSTEP_LOG_LEVEL` | `info` | Log filter, falls back to `RUST_LOG` |
//! | `LOCKSTEP_JSON_LOGS` | `false` | Emit one JSON object per event |
//! | `LOCKSTEP_SERVICE_NAME` | `lockstep` | Name logged at startup |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::env_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber described by `config`.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_setup::init_tracing(&config)
}

/// Span covering all iterations of one scenario, carrying its name.
///
/// Each iteration opens its own `scenario` span (with a run id) inside it.
///
/// # Example
///
/// ```rust,ignore
/// let span = lockstep_telemetry::run_span!(spec.name, iterations = 10);
/// runner.run(&spec).instrument(span).await?;
/// ```
#[macro_export]
macro_rules! run_span {
    ($name:expr) => {
        tracing::info_span!("run", scenario = %$name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!("run", scenario = %$name, $($field)*)
    };
}
