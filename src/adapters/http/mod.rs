//! HTTP Adapters - reqwest Client and JSON Data Source
//!
//! Shared pieces for every HTTP-based adapter: client construction
//! with the configured timeout, and the mapping of reqwest results onto
//! `CallError`. Network failures and non-2xx statuses become
//! `Transport` errors (retryable), bodies that are not JSON become
//! `Parse` errors.

pub mod data_source;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde_json::Value;

use crate::resilience::CallError;

pub use data_source::HttpDataSource;

/// Longest error body kept in a `CallError` message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Build the reqwest client shared by all adapters.
pub fn build_client(timeout: Duration) -> Result<Client> {
  Client::builder()
    .timeout(timeout)
    .pool_max_idle_per_host(5)
    .user_agent(concat!("crypto-briefing-bot/", env!("CARGO_PKG_VERSION")))
    .build()
    .context("Failed to build HTTP client")
}

/// Map a send result to the decoded JSON body.
pub(crate) async fn read_json(
  dependency: &str,
  sent: reqwest::Result<Response>,
) -> Result<Value, CallError> {
  let response = sent.map_err(|e| transport_error(dependency, e))?;
  let status = response.status();
  let body = response
    .text()
    .await
    .map_err(|e| transport_error(dependency, e))?;

  if !status.is_success() {
    return Err(CallError::transport(
      dependency,
      Some(status.as_u16()),
      truncate(&body, MAX_ERROR_BODY_CHARS),
    ));
  }

  serde_json::from_str(&body).map_err(|e| CallError::parse(dependency, format!("invalid JSON body: {e}")))
}

/// The request URL is dropped from the message; it may carry credentials.
fn transport_error(dependency: &str, error: reqwest::Error) -> CallError {
  let status = error.status().map(|s| s.as_u16());
  let message = if error.is_timeout() {
    "request timed out".to_string()
  } else {
    error.without_url().to_string()
  };
  CallError::transport(dependency, status, message)
}

/// First `max` characters of `text`, marked when cut.
pub(crate) fn truncate(text: &str, max: usize) -> String {
  match text.char_indices().nth(max) {
    Some((idx, _)) => format!("{}…", &text[..idx]),
    None => text.to_string(),
  }
}
