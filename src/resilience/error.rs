//! Call Errors - Failure Taxonomy for Outbound Dependencies
//!
//! Every outbound call made by the bot (market data, news, LLM,
//! Telegram) fails with a `CallError`. The variants keep "this request
//! failed" apart from "this dependency is actively circuit-broken" so
//! callers and operators can tell the two situations apart.

use thiserror::Error;

/// Failure of a single guarded dependency call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
  /// Network failure or non-success HTTP status.
  #[error("{dependency} transport error{}: {message}", status_suffix(.status))]
  Transport {
    /// Dependency name (e.g. "market").
    dependency: String,
    /// HTTP status, when a response was received.
    status: Option<u16>,
    /// Underlying message.
    message: String,
  },

  /// The dependency's circuit breaker rejected the call without trying it.
  #[error("{dependency} circuit breaker is open")]
  BreakerOpen {
    /// Dependency name.
    dependency: String,
  },

  /// A successful response could not be interpreted.
  #[error("{dependency} returned an unparsable payload: {message}")]
  Parse {
    /// Dependency name.
    dependency: String,
    /// What was wrong with the payload.
    message: String,
  },
}

impl CallError {
  /// Build a transport error.
  pub fn transport(
    dependency: impl Into<String>,
    status: Option<u16>,
    message: impl Into<String>,
  ) -> Self {
    Self::Transport {
      dependency: dependency.into(),
      status,
      message: message.into(),
    }
  }

  /// Build a parse error.
  pub fn parse(dependency: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Parse {
      dependency: dependency.into(),
      message: message.into(),
    }
  }

  /// Name of the dependency that produced this error.
  pub fn dependency(&self) -> &str {
    match self {
      Self::Transport { dependency, .. }
      | Self::BreakerOpen { dependency }
      | Self::Parse { dependency, .. } => dependency,
    }
  }

  /// Whether the retry layer may try again after this error.
  ///
  /// An open breaker always escalates immediately.
  pub const fn is_retryable(&self) -> bool {
    !matches!(self, Self::BreakerOpen { .. })
  }

  /// Whether this is the distinguished "circuit open" failure.
  pub const fn is_breaker_open(&self) -> bool {
    matches!(self, Self::BreakerOpen { .. })
  }
}

fn status_suffix(status: &Option<u16>) -> String {
  status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}
