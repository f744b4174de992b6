//! Run Trigger Port - Inbound Interface
//!
//! Anything that can start a pipeline run on demand: the scheduler,
//! the HTTP `/run` endpoint, tests. `RunObserver` is the outbound side:
//! it is told how each run ended.

use async_trait::async_trait;

use crate::domain::RunSummary;
use crate::resilience::CircuitState;

/// Trait for starting one pipeline run and waiting for its outcome.
#[async_trait]
pub trait RunTrigger: Send + Sync + 'static {
  /// Run the pipeline once. Runs started concurrently are serialized.
  async fn run_once(&self) -> RunSummary;
}

/// Receives the outcome of every run (metrics, dashboards).
pub trait RunObserver: Send + Sync + 'static {
  /// Called once per finished run with each dependency's breaker state.
  fn record_run(&self, summary: &RunSummary, breakers: &[(&str, CircuitState)]);
}
