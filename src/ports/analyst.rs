//! Analyst Port - Language Model Interface
//!
//! Sentiment synthesis and per-coin analysis are both a single
//! prompt-in, text-out completion.

use async_trait::async_trait;

use crate::domain::Prompt;
use crate::resilience::CallError;

/// Trait for language model providers.
#[async_trait]
pub trait Analyst: Send + Sync + 'static {
  /// Complete `prompt` and return the model's text answer.
  ///
  /// # Errors
  /// `CallError::Transport` on network failure or non-success status,
  /// `CallError::Parse` when the response carries no answer text.
  async fn complete(&self, prompt: &Prompt) -> Result<String, CallError>;
}
