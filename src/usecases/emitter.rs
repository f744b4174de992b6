//! Chunked Emitter - Ordered Delivery of Oversized Payloads
//!
//! Splits a payload with `split_into_chunks` and sends the segments
//! strictly in order to one destination, pausing between segments to
//! respect the transport's own rate limits. Each segment send goes
//! through the delivery dependency's retry/breaker guard. The first
//! segment that still fails aborts the rest of the payload and is
//! reported to the caller.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument};

use crate::config::EmitterConfig;
use crate::domain::split_into_chunks;
use crate::ports::Delivery;
use crate::resilience::{CallError, ResilientDependency};

/// Delivery of a payload stopped at `segment` (1-based) of `total`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("delivery aborted at segment {segment}/{total}: {source}")]
pub struct EmitError {
  pub segment: usize,
  pub total: usize,
  #[source]
  pub source: CallError,
}

/// Splits payloads and delivers the segments in order.
pub struct ChunkedEmitter<D: Delivery> {
  delivery: Arc<D>,
  guard: ResilientDependency,
  max_chunk_chars: usize,
  segment_pause: Duration,
}

impl<D: Delivery> ChunkedEmitter<D> {
  /// Create an emitter.
  ///
  /// The effective segment size never exceeds the transport's own limit.
  pub fn new(
    delivery: Arc<D>,
    guard: ResilientDependency,
    max_chunk_chars: usize,
    segment_pause: Duration,
  ) -> Self {
    let max_chunk_chars = max_chunk_chars.min(delivery.max_message_chars()).max(1);
    Self {
      delivery,
      guard,
      max_chunk_chars,
      segment_pause,
    }
  }

  /// Create an emitter from the `[emitter]` config section.
  pub fn from_config(delivery: Arc<D>, guard: ResilientDependency, config: &EmitterConfig) -> Self {
    Self::new(
      delivery,
      guard,
      config.max_chunk_chars,
      Duration::from_millis(config.segment_pause_ms),
    )
  }

  /// The delivery dependency guard.
  pub const fn dependency(&self) -> &ResilientDependency {
    &self.guard
  }

  /// Effective maximum segment size.
  pub const fn max_chunk_chars(&self) -> usize {
    self.max_chunk_chars
  }

  /// Deliver `text` to `destination`, returning the number of segments sent.
  ///
  /// Segments already delivered before a failure stay delivered.
  #[instrument(skip(self, text), fields(chars = text.chars().count()))]
  pub async fn emit(&self, destination: &str, text: &str) -> Result<usize, EmitError> {
    let chunks = split_into_chunks(text, self.max_chunk_chars);
    let total = chunks.len();

    for (i, chunk) in chunks.iter().enumerate() {
      if i > 0 {
        sleep(self.segment_pause).await;
      }

      if let Err(source) = self
        .guard
        .call(|| self.delivery.send(destination, chunk))
        .await
      {
        error!(
          segment = i + 1,
          total,
          error = %source,
          "Segment delivery failed, aborting remaining segments"
        );
        return Err(EmitError {
          segment: i + 1,
          total,
          source,
        });
      }

      debug!(segment = i + 1, total, "Segment delivered");
    }

    Ok(total)
  }
}
