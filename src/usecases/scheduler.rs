//! Scheduler - Periodic Pipeline Runs
//!
//! Triggers a run every `interval_seconds` until shutdown. A tick that
//! comes due while a run is still going is delayed, never stacked.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::config::ScheduleConfig;
use crate::ports::RunTrigger;

/// Run `trigger` on the configured interval until `shutdown_rx` fires.
///
/// With `run_on_start` the first run happens immediately, otherwise
/// one full interval after start.
#[instrument(skip_all, fields(interval_seconds = config.interval_seconds))]
pub async fn run_schedule(
  trigger: Arc<dyn RunTrigger>,
  config: ScheduleConfig,
  mut shutdown_rx: broadcast::Receiver<()>,
) {
  let mut ticker = interval(Duration::from_secs(config.interval_seconds));
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  if !config.run_on_start {
    // The first tick of a tokio interval completes immediately.
    ticker.tick().await;
  }

  info!(run_on_start = config.run_on_start, "Scheduler started");

  loop {
    tokio::select! {
      biased;
      _ = shutdown_rx.recv() => {
        info!("Scheduler received shutdown signal");
        break;
      }
      _ = ticker.tick() => {
        let summary = trigger.run_once().await;
        if !summary.ok {
          warn!(
            error = summary.error.as_deref().unwrap_or(""),
            failed = summary.failed.len(),
            "Scheduled run did not fully succeed"
          );
        }
      }
    }
  }
}
