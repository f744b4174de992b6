//! Pipeline Trigger - Serialized On-Demand Runs
//!
//! Wraps a `BatchPipeline` behind the `RunTrigger` port. Runs never
//! overlap: a second trigger waits for the run in progress to finish.
//! Each run executes in its own task so that a caller going away
//! (an HTTP client disconnecting, a shutdown) cannot cancel it half-way
//! and leave a breaker probe unresolved.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

use crate::domain::RunSummary;
use crate::ports::{Analyst, DataSource, Delivery, RunObserver, RunTrigger};

use super::pipeline::BatchPipeline;

/// `RunTrigger` over a shared pipeline.
pub struct PipelineTrigger<S: DataSource, A: Analyst, D: Delivery> {
  pipeline: Arc<BatchPipeline<S, A, D>>,
  run_lock: Arc<Mutex<()>>,
  observer: Option<Arc<dyn RunObserver>>,
}

impl<S: DataSource, A: Analyst, D: Delivery> PipelineTrigger<S, A, D> {
  pub fn new(pipeline: Arc<BatchPipeline<S, A, D>>) -> Self {
    Self {
      pipeline,
      run_lock: Arc::new(Mutex::new(())),
      observer: None,
    }
  }

  /// Report every finished run to `observer`.
  #[must_use]
  pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
    self.observer = Some(observer);
    self
  }

  /// True while a run holds the lock.
  pub fn is_running(&self) -> bool {
    self.run_lock.try_lock().is_err()
  }
}

#[async_trait]
impl<S: DataSource, A: Analyst, D: Delivery> RunTrigger for PipelineTrigger<S, A, D> {
  async fn run_once(&self) -> RunSummary {
    let pipeline = Arc::clone(&self.pipeline);
    let run_lock = Arc::clone(&self.run_lock);
    let observer = self.observer.clone();

    let task = tokio::spawn(async move {
      let _guard = run_lock.lock().await;
      let started = Instant::now();

      let summary = match pipeline.run().await {
        Ok(result) => RunSummary::from_batch(&result),
        Err(e) => RunSummary::fatal(
          e.to_string(),
          u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        ),
      };

      if let Some(observer) = observer {
        observer.record_run(&summary, &pipeline.breaker_states());
      }
      summary
    });

    match task.await {
      Ok(summary) => {
        info!(
          ok = summary.ok,
          succeeded = summary.succeeded.len(),
          failed = summary.failed.len(),
          duration_ms = summary.duration_ms,
          "Triggered run finished"
        );
        summary
      }
      Err(e) => {
        error!(error = %e, "Pipeline run task did not complete");
        RunSummary::fatal(format!("run task failed: {e}"), 0)
      }
    }
  }
}
