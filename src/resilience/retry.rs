//! Resilient Call - Bounded Retry with Backoff
//!
//! Runs one outbound operation up to `max_attempts` times, sleeping
//! between attempts. Two schedules are supported:
//! - `Exponential`: `base * 2^i` after attempt `i` (market data, news)
//! - `Linear`: `base * (i + 1)` after attempt `i` (LLM, Telegram)
//!
//! The last error is returned once the attempt budget is exhausted.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use super::error::CallError;

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
  /// `base * 2^i`.
  Exponential,
  /// `base * (i + 1)`.
  Linear,
}

/// Retry budget and schedule for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts including the first one.
  pub max_attempts: u32,
  /// Base delay the schedule is scaled from.
  pub base_delay: Duration,
  /// Schedule shape.
  pub backoff: Backoff,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::exponential(3, Duration::from_millis(1000))
  }
}

impl RetryPolicy {
  /// Exponential backoff policy.
  pub const fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
    Self {
      max_attempts,
      base_delay,
      backoff: Backoff::Exponential,
    }
  }

  /// Linear ("fixed step") backoff policy.
  pub const fn linear(max_attempts: u32, base_delay: Duration) -> Self {
    Self {
      max_attempts,
      base_delay,
      backoff: Backoff::Linear,
    }
  }

  /// Delay to wait after the 0-indexed attempt `attempt` failed.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    match self.backoff {
      Backoff::Exponential => self
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt)),
      Backoff::Linear => self.base_delay.saturating_mul(attempt.saturating_add(1)),
    }
  }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
  Success,
  Failure,
}

/// Record of one attempt, logged and then dropped.
#[derive(Debug, Clone)]
pub struct CallAttempt {
  /// 1-based attempt number.
  pub attempt_number: u32,
  /// When the attempt started.
  pub started_at: Instant,
  /// Success or failure.
  pub outcome: AttemptOutcome,
  /// Error text on failure.
  pub error: Option<String>,
}

impl CallAttempt {
  fn from_result<T>(
    attempt_number: u32,
    started_at: Instant,
    result: &Result<T, CallError>,
  ) -> Self {
    match result {
      Ok(_) => Self {
        attempt_number,
        started_at,
        outcome: AttemptOutcome::Success,
        error: None,
      },
      Err(e) => Self {
        attempt_number,
        started_at,
        outcome: AttemptOutcome::Failure,
        error: Some(e.to_string()),
      },
    }
  }

  fn log(&self, dependency: &str, max_attempts: u32) {
    let elapsed_ms = self.started_at.elapsed().as_millis() as u64;
    match (&self.outcome, &self.error) {
      (AttemptOutcome::Success, _) => debug!(
        dependency,
        attempt = self.attempt_number,
        max_attempts,
        elapsed_ms,
        "Call attempt succeeded"
      ),
      (AttemptOutcome::Failure, error) => warn!(
        dependency,
        attempt = self.attempt_number,
        max_attempts,
        elapsed_ms,
        error = error.as_deref().unwrap_or_default(),
        "Call attempt failed"
      ),
    }
  }
}

/// Execute `op` under `policy`, retrying failed attempts with backoff.
///
/// `op` is invoked at most `policy.max_attempts` times (at least once).
/// A `BreakerOpen` error is returned immediately without retrying.
pub async fn retry<T, F, Fut>(
  policy: &RetryPolicy,
  dependency: &str,
  mut op: F,
) -> Result<T, CallError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, CallError>>,
{
  let max_attempts = policy.max_attempts.max(1);
  let mut attempt = 0u32;

  loop {
    let started_at = Instant::now();
    let result = op().await;
    CallAttempt::from_result(attempt + 1, started_at, &result).log(dependency, max_attempts);

    match result {
      Ok(value) => return Ok(value),
      Err(e) if !e.is_retryable() => return Err(e),
      Err(e) if attempt + 1 >= max_attempts => {
        error!(
          dependency,
          attempts = max_attempts,
          error = %e,
          "Retry budget exhausted"
        );
        return Err(e);
      }
      Err(_) => {
        let delay = policy.delay_after(attempt);
        debug!(
          dependency,
          attempt = attempt + 1,
          delay_ms = delay.as_millis() as u64,
          "Backing off before retry"
        );
        sleep(delay).await;
        attempt += 1;
      }
    }
  }
}
