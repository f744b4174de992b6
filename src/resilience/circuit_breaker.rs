//! Circuit Breaker - Per-Dependency Failure Guard
//!
//! Short-circuits calls to a dependency that keeps failing.
//!
//! ```text
//! Closed   → Open:     consecutive_failures >= failure_threshold
//! Open     → HalfOpen: next call after reset_timeout since last failure
//! HalfOpen → Closed:   the single probe call succeeds
//! HalfOpen → Open:     the probe fails (timeout restarts)
//! ```
//!
//! The record sits behind a `std::sync::Mutex` that is never held
//! across an await point.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::CallError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
  /// Calls pass through.
  Closed,
  /// Calls are rejected without being attempted.
  Open,
  /// One probe call is allowed through.
  HalfOpen,
}

impl CircuitState {
  /// Numeric encoding for the metrics gauge.
  pub const fn as_gauge(self) -> f64 {
    match self {
      Self::Closed => 0.0,
      Self::HalfOpen => 1.0,
      Self::Open => 2.0,
    }
  }
}

/// Snapshot of a breaker's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerRecord {
  pub state: CircuitState,
  pub consecutive_failures: u32,
  pub last_failure_at: Option<Instant>,
  pub failure_threshold: u32,
  pub reset_timeout: Duration,
}

#[derive(Debug)]
struct BreakerInner {
  record: BreakerRecord,
  /// A HalfOpen probe has been admitted and has not reported back yet.
  probe_in_flight: bool,
}

/// Circuit breaker scoped to one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
  dependency: String,
  inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
  /// Default consecutive failures before tripping.
  pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
  /// Default cool-down before a probe is allowed.
  pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

  /// Create a closed breaker.
  pub fn new(
    dependency: impl Into<String>,
    failure_threshold: u32,
    reset_timeout: Duration,
  ) -> Self {
    Self {
      dependency: dependency.into(),
      inner: Mutex::new(BreakerInner {
        record: BreakerRecord {
          state: CircuitState::Closed,
          consecutive_failures: 0,
          last_failure_at: None,
          failure_threshold: failure_threshold.max(1),
          reset_timeout,
        },
        probe_in_flight: false,
      }),
    }
  }

  /// Create a breaker with the default threshold and timeout.
  pub fn with_defaults(dependency: impl Into<String>) -> Self {
    Self::new(
      dependency,
      Self::DEFAULT_FAILURE_THRESHOLD,
      Self::DEFAULT_RESET_TIMEOUT,
    )
  }

  /// Dependency this breaker guards.
  pub fn dependency(&self) -> &str {
    &self.dependency
  }

  /// Current state.
  pub fn state(&self) -> CircuitState {
    self.lock().record.state
  }

  /// Current consecutive failure count.
  pub fn consecutive_failures(&self) -> u32 {
    self.lock().record.consecutive_failures
  }

  /// Copy of the full record.
  pub fn snapshot(&self) -> BreakerRecord {
    self.lock().record.clone()
  }

  /// Run `op` if the breaker admits it and record the outcome.
  ///
  /// Fails with `CallError::BreakerOpen` without invoking `op` while
  /// the breaker is open. Dropping the returned future before `op`
  /// finishes counts as a failed call.
  pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, CallError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
  {
    self.try_acquire()?;
    let admitted = Admitted {
      breaker: self,
      settled: false,
    };

    let result = op().await;
    admitted.settle(&result);
    result
  }

  fn lock(&self) -> MutexGuard<'_, BreakerInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn rejected(&self) -> CallError {
    CallError::BreakerOpen {
      dependency: self.dependency.clone(),
    }
  }

  /// Admission check, moving Open → HalfOpen once the timeout elapsed.
  fn try_acquire(&self) -> Result<(), CallError> {
    let mut inner = self.lock();

    match inner.record.state {
      CircuitState::Closed => Ok(()),
      CircuitState::Open => {
        let cooled_down = inner
          .record
          .last_failure_at
          .is_none_or(|at| at.elapsed() >= inner.record.reset_timeout);

        if cooled_down {
          inner.record.state = CircuitState::HalfOpen;
          inner.probe_in_flight = true;
          info!(dependency = %self.dependency, "Circuit breaker half-open, probing");
          Ok(())
        } else {
          debug!(dependency = %self.dependency, "Circuit breaker open, rejecting call");
          Err(self.rejected())
        }
      }
      CircuitState::HalfOpen => {
        if inner.probe_in_flight {
          debug!(dependency = %self.dependency, "Probe in flight, rejecting call");
          Err(self.rejected())
        } else {
          inner.probe_in_flight = true;
          Ok(())
        }
      }
    }
  }

  fn on_success(&self) {
    let mut inner = self.lock();
    if inner.record.state != CircuitState::Closed {
      info!(dependency = %self.dependency, "Circuit breaker closed after successful probe");
    }
    inner.record.state = CircuitState::Closed;
    inner.record.consecutive_failures = 0;
    inner.probe_in_flight = false;
  }

  /// An admitted call was dropped before reporting back.
  fn on_abandoned(&self) {
    let mut inner = self.lock();
    inner.probe_in_flight = false;
    if inner.record.state == CircuitState::HalfOpen {
      inner.record.state = CircuitState::Open;
      inner.record.consecutive_failures = inner.record.consecutive_failures.saturating_add(1);
      inner.record.last_failure_at = Some(Instant::now());
      warn!(dependency = %self.dependency, "Probe cancelled, circuit breaker re-opened");
    }
  }

  fn on_failure(&self, error: &CallError) {
    let mut inner = self.lock();
    inner.probe_in_flight = false;
    inner.record.consecutive_failures = inner.record.consecutive_failures.saturating_add(1);
    inner.record.last_failure_at = Some(Instant::now());

    let failures = inner.record.consecutive_failures;
    match inner.record.state {
      CircuitState::HalfOpen => {
        inner.record.state = CircuitState::Open;
        warn!(
          dependency = %self.dependency,
          error = %error,
          "Probe failed, circuit breaker re-opened"
        );
      }
      CircuitState::Closed if failures >= inner.record.failure_threshold => {
        inner.record.state = CircuitState::Open;
        warn!(
          dependency = %self.dependency,
          consecutive_failures = failures,
          reset_timeout_ms = inner.record.reset_timeout.as_millis() as u64,
          error = %error,
          "Circuit breaker tripped"
        );
      }
      _ => {}
    }
  }
}

/// Outcome slot for an admitted call; reports abandonment on drop.
struct Admitted<'a> {
  breaker: &'a CircuitBreaker,
  settled: bool,
}

impl Admitted<'_> {
  fn settle<T>(mut self, result: &Result<T, CallError>) {
    self.settled = true;
    match result {
      Ok(_) => self.breaker.on_success(),
      Err(e) => self.breaker.on_failure(e),
    }
  }
}

impl Drop for Admitted<'_> {
  fn drop(&mut self) {
    if !self.settled {
      self.breaker.on_abandoned();
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn fail() -> Result<(), CallError> {
    Err(CallError::transport("market", Some(502), "bad gateway"))
  }

  async fn trip(breaker: &CircuitBreaker, calls: &AtomicU32) {
    for _ in 0..breaker.snapshot().failure_threshold {
      let _ = breaker
        .execute(|| async {
          calls.fetch_add(1, Ordering::SeqCst);
          fail()
        })
        .await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_trips_after_threshold_and_stops_calling() {
    let breaker = CircuitBreaker::new("market", 5, Duration::from_secs(60));
    let calls = AtomicU32::new(0);

    trip(&breaker, &calls).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    for _ in 0..3 {
      let result = breaker
        .execute(|| async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(())
        })
        .await;
      assert!(result.unwrap_err().is_breaker_open());
    }
    // Counter frozen: the operation was never invoked while open.
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let record = breaker.snapshot();
    assert!(record.consecutive_failures >= record.failure_threshold);
  }

  #[tokio::test(start_paused = true)]
  async fn test_success_resets_counter_while_closed() {
    let breaker = CircuitBreaker::new("news", 3, Duration::from_secs(60));
    let _ = breaker.execute(|| async { fail() }).await;
    let _ = breaker.execute(|| async { fail() }).await;
    assert_eq!(breaker.consecutive_failures(), 2);

    breaker.execute(|| async { Ok(()) }).await.unwrap();
    assert_eq!(breaker.consecutive_failures(), 0);
    assert_eq!(breaker.state(), CircuitState::Closed);
  }

  #[tokio::test(start_paused = true)]
  async fn test_half_open_probe_success_closes() {
    let breaker = CircuitBreaker::new("market", 5, Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    trip(&breaker, &calls).await;

    tokio::time::advance(Duration::from_secs(61)).await;

    breaker
      .execute(|| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
      })
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_half_open_probe_failure_reopens_and_restarts_timeout() {
    let breaker = CircuitBreaker::new("market", 5, Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    trip(&breaker, &calls).await;

    tokio::time::advance(Duration::from_secs(61)).await;
    let _ = breaker
      .execute(|| async {
        calls.fetch_add(1, Ordering::SeqCst);
        fail()
      })
      .await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    // Half the timeout later the breaker is still open.
    tokio::time::advance(Duration::from_secs(30)).await;
    let result = breaker.execute(|| async { Ok(()) }).await;
    assert!(result.unwrap_err().is_breaker_open());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(breaker.execute(|| async { Ok(()) }).await.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
  }

  #[tokio::test(start_paused = true)]
  async fn test_half_open_admits_single_probe() {
    let breaker = CircuitBreaker::new("llm", 1, Duration::from_secs(10));
    let _ = breaker.execute(|| async { fail() }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(breaker.try_acquire().is_ok());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    // A second caller while the probe is outstanding is rejected.
    assert!(breaker.try_acquire().unwrap_err().is_breaker_open());
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_probe_reopens_instead_of_wedging() {
    let breaker = CircuitBreaker::new("llm", 1, Duration::from_secs(10));
    let _ = breaker.execute(|| async { fail() }).await;
    tokio::time::advance(Duration::from_secs(11)).await;

    let cancelled = tokio::time::timeout(
      Duration::from_secs(1),
      breaker.execute(|| std::future::pending::<Result<(), CallError>>()),
    )
    .await;
    assert!(cancelled.is_err());

    // The abandoned probe counts as a failure and restarts the timeout.
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.consecutive_failures(), 2);
    let result = breaker.execute(|| async { Ok(()) }).await;
    assert!(result.unwrap_err().is_breaker_open());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(breaker.execute(|| async { Ok(()) }).await.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_call_while_closed_leaves_breaker_closed() {
    let breaker = CircuitBreaker::new("news", 3, Duration::from_secs(10));

    let cancelled = tokio::time::timeout(
      Duration::from_secs(1),
      breaker.execute(|| std::future::pending::<Result<(), CallError>>()),
    )
    .await;

    assert!(cancelled.is_err());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
  }
}
