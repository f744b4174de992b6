//! Data Source Port - JSON Fetch Interface
//!
//! The pipeline reaches market-data and news providers only through
//! this trait: "fetch JSON for a URL and query parameters, may fail".
//! Implementations map network errors and non-2xx statuses to
//! `CallError::Transport`, so the resilience layer can treat both
//! uniformly.

use async_trait::async_trait;
use serde_json::Value;

use crate::resilience::CallError;

/// A GET request against a JSON API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
  /// Dependency name used in errors and logs ("market", "news").
  pub dependency: &'static str,
  /// Absolute URL.
  pub url: String,
  /// Query string parameters, in order.
  pub query: Vec<(String, String)>,
}

impl DataRequest {
  /// Create a request without query parameters.
  pub fn new(dependency: &'static str, url: impl Into<String>) -> Self {
    Self {
      dependency,
      url: url.into(),
      query: Vec::new(),
    }
  }

  /// Append a query parameter.
  #[must_use]
  pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }
}

/// Trait for JSON data providers.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
  /// Fetch and decode the JSON body for `request`.
  ///
  /// # Errors
  /// `CallError::Transport` on network failure or non-success status,
  /// `CallError::Parse` if the body is not JSON.
  async fn fetch(&self, request: &DataRequest) -> Result<Value, CallError>;
}
