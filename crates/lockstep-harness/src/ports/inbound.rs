//! Inbound port
//!
//! The runner repeats whatever implements `ScenarioExecutor`; the
//! orchestrator is the production implementation.

use crate::domain::errors::HarnessError;
use crate::domain::outcome::ScenarioResult;
use crate::domain::scenario::ScenarioSpec;
use async_trait::async_trait;

/// Executes one run of a scenario.
#[async_trait]
pub trait ScenarioExecutor: Send + Sync {
    /// Run `spec` once and return what happened.
    ///
    /// Transactional errors inside flows are part of the result; an `Err`
    /// means the scenario could not be run (setup failure, invalid spec).
    async fn execute(&self, spec: &ScenarioSpec) -> Result<ScenarioResult, HarnessError>;
}
