//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `lockstep_engine=debug,info`
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to use ANSI colours in human-readable output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "lockstep".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOCKSTEP_SERVICE_NAME`: Service name (default: lockstep)
    /// - `LOCKSTEP_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `LOCKSTEP_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `NO_COLOR`: Disable ANSI colours when set
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("LOCKSTEP_SERVICE_NAME").unwrap_or_else(|_| "lockstep".to_string()),

            log_level: env::var("LOCKSTEP_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("LOCKSTEP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            ansi: env::var("NO_COLOR").is_err(),
        }
    }

    /// Override the filter, e.g. from a `--verbose` flag.
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}
