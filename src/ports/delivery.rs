//! Delivery Port - Chat Transport Interface
//!
//! `send(destination, text)` delivers one message. Callers are
//! responsible for keeping `text` within `max_message_chars()`; the
//! `ChunkedEmitter` use case does this for arbitrary payloads.

use async_trait::async_trait;

use crate::resilience::CallError;

/// Trait for chat transports.
#[async_trait]
pub trait Delivery: Send + Sync + 'static {
  /// Hard per-message size limit of the transport, in characters.
  fn max_message_chars(&self) -> usize;

  /// Send one message to `destination`.
  ///
  /// # Errors
  /// `CallError::Transport` if the transport rejects or fails the send.
  async fn send(&self, destination: &str, text: &str) -> Result<(), CallError>;
}
