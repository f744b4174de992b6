//! Resilience Layer - Guarded Calls to External Dependencies
//!
//! Every outbound call goes through a `ResilientDependency`, which
//! composes the three guards in one fixed order:
//!
//! ```text
//! breaker.execute(retry(policy, { limiter.acquire_slot(); raw_call }))
//! ```
//!
//! One breaker trip therefore corresponds to `failure_threshold`
//! exhausted retry loops, and every individual attempt (including
//! retries) takes a rate-limiter slot.
//!
//! Sub-modules:
//! - `error`: `CallError` taxonomy
//! - `retry`: bounded retry with exponential or linear backoff
//! - `circuit_breaker`: Closed/Open/HalfOpen guard
//! - `rate_limiter`: sliding-window admission control

pub mod circuit_breaker;
pub mod error;
pub mod rate_limiter;
pub mod retry;

use std::future::Future;
use std::time::Duration;

pub use circuit_breaker::{BreakerRecord, CircuitBreaker, CircuitState};
pub use error::CallError;
pub use rate_limiter::RateLimiter;
pub use retry::{retry, Backoff, CallAttempt, RetryPolicy};

use crate::config::DependencyConfig;

/// Retry policy, breaker and optional rate limiter bound to one dependency.
///
/// Owned by the pipeline for the life of the process and shared by
/// reference with every call site that reaches the dependency.
#[derive(Debug)]
pub struct ResilientDependency {
  name: String,
  policy: RetryPolicy,
  breaker: CircuitBreaker,
  limiter: Option<RateLimiter>,
}

impl ResilientDependency {
  /// Assemble a dependency guard from its parts.
  pub fn new(
    name: impl Into<String>,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    limiter: Option<RateLimiter>,
  ) -> Self {
    Self {
      name: name.into(),
      policy,
      breaker,
      limiter,
    }
  }

  /// Build the guard described by a `[dependencies.<name>]` config section.
  pub fn from_config(name: &str, config: &DependencyConfig) -> Self {
    let policy = RetryPolicy {
      max_attempts: config.max_attempts,
      base_delay: Duration::from_millis(config.base_backoff_ms),
      backoff: config.backoff,
    };
    let breaker = CircuitBreaker::new(
      name,
      config.failure_threshold,
      Duration::from_millis(config.reset_timeout_ms),
    );
    let limiter = config
      .rate_limit
      .as_ref()
      .map(|rl| RateLimiter::new(name, rl.max_requests, Duration::from_millis(rl.window_ms)));

    Self::new(name, policy, breaker, limiter)
  }

  /// Dependency name used in logs and errors.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Retry policy for this dependency.
  pub const fn policy(&self) -> &RetryPolicy {
    &self.policy
  }

  /// The dependency's circuit breaker.
  pub const fn breaker(&self) -> &CircuitBreaker {
    &self.breaker
  }

  /// The dependency's rate limiter, if it has one.
  pub const fn limiter(&self) -> Option<&RateLimiter> {
    self.limiter.as_ref()
  }

  /// Run `op` through breaker, retry and rate limiter.
  ///
  /// `op` builds a fresh future per attempt.
  pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, CallError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
  {
    self.breaker.execute(|| self.retry_admitted(op)).await
  }

  async fn retry_admitted<T, F, Fut>(&self, mut op: F) -> Result<T, CallError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
  {
    let limiter = self.limiter.as_ref();
    retry(&self.policy, &self.name, || {
      let attempt = op();
      async move {
        if let Some(limiter) = limiter {
          limiter.acquire_slot().await;
        }
        attempt.await
      }
    })
    .await
  }
}
