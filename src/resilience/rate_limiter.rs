//! Rate Limiter - Sliding-Window Admission Control
//!
//! Keeps the start instants of calls made in the trailing window and
//! suspends the caller until the oldest one ages out when the window
//! is full. At most `max_requests` calls start in any trailing
//! `window`, including across what a fixed-bucket limiter would treat
//! as bucket boundaries.
//!
//! The window is guarded by a `tokio::sync::Mutex` held across the
//! admission wait, so concurrent acquirers queue in FIFO order.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Sliding-window limiter for one dependency.
#[derive(Debug)]
pub struct RateLimiter {
  dependency: String,
  max_requests: usize,
  window: Duration,
  /// Call-start instants inside the trailing window, oldest first.
  timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
  /// Default admissions per window.
  pub const DEFAULT_MAX_REQUESTS: usize = 10;
  /// Default window length.
  pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);

  /// Create a limiter admitting `max_requests` per `window`.
  pub fn new(dependency: impl Into<String>, max_requests: usize, window: Duration) -> Self {
    let max_requests = max_requests.max(1);
    Self {
      dependency: dependency.into(),
      max_requests,
      window,
      timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
    }
  }

  /// Create a limiter with the default 10 requests / 60 s.
  pub fn with_defaults(dependency: impl Into<String>) -> Self {
    Self::new(dependency, Self::DEFAULT_MAX_REQUESTS, Self::DEFAULT_WINDOW)
  }

  /// Maximum admissions per window.
  pub const fn max_requests(&self) -> usize {
    self.max_requests
  }

  /// Window length.
  pub const fn window(&self) -> Duration {
    self.window
  }

  /// Wait for a free slot and record the call start.
  ///
  /// Returns how long the caller was suspended.
  pub async fn acquire_slot(&self) -> Duration {
    let mut timestamps = self.timestamps.lock().await;
    let requested_at = Instant::now();

    loop {
      let now = Instant::now();
      while timestamps
        .front()
        .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
      {
        timestamps.pop_front();
      }

      if timestamps.len() < self.max_requests {
        timestamps.push_back(now);
        let waited = now.duration_since(requested_at);
        debug!(
          dependency = %self.dependency,
          in_window = timestamps.len(),
          waited_ms = waited.as_millis() as u64,
          "Rate limiter slot acquired"
        );
        return waited;
      }

      let Some(oldest) = timestamps.front().copied() else {
        continue;
      };
      let wait = self.window.saturating_sub(now.duration_since(oldest));
      info!(
        dependency = %self.dependency,
        max_requests = self.max_requests,
        wait_ms = wait.as_millis() as u64,
        "Rate limit reached, waiting for window to slide"
      );
      sleep(wait).await;
    }
  }

  /// Number of call starts currently inside the window.
  pub async fn in_window(&self) -> usize {
    let timestamps = self.timestamps.lock().await;
    let now = Instant::now();
    timestamps
      .iter()
      .filter(|t| now.duration_since(**t) < self.window)
      .count()
  }
}
