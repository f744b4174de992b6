//! Telegram Bot API sender.
//!
//! Messages are sent as plain text (no `parse_mode`), so model output
//! containing stray Markdown characters cannot make Telegram reject a
//! segment. The Bot API answers `{"ok": false, "description": ...}`
//! on failure, sometimes with HTTP 200; both shapes are transport
//! errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::adapters::http::read_json;
use crate::ports::Delivery;
use crate::resilience::CallError;

const DEPENDENCY: &str = "delivery";

/// Hard limit of one Telegram message.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
  chat_id: &'a str,
  text: &'a str,
  disable_web_page_preview: bool,
}

/// `Delivery` over the Telegram Bot API.
pub struct TelegramDelivery {
  http: Client,
  endpoint: String,
}

impl TelegramDelivery {
  /// `base_url` is the Bot API root, e.g. `https://api.telegram.org`.
  pub fn new(http: Client, base_url: &str, bot_token: &str) -> Self {
    Self {
      http,
      endpoint: format!("{}/bot{bot_token}/sendMessage", base_url.trim_end_matches('/')),
    }
  }
}

/// Reject a 2xx body that still reports `ok: false`.
fn check_ack(body: &Value) -> Result<(), CallError> {
  if body.get("ok").and_then(Value::as_bool) == Some(true) {
    return Ok(());
  }
  let status = body
    .get("error_code")
    .and_then(Value::as_u64)
    .and_then(|c| u16::try_from(c).ok());
  let description = body
    .get("description")
    .and_then(Value::as_str)
    .unwrap_or("sendMessage not acknowledged");
  Err(CallError::transport(DEPENDENCY, status, description))
}

#[async_trait]
impl Delivery for TelegramDelivery {
  fn max_message_chars(&self) -> usize {
    TELEGRAM_MAX_MESSAGE_CHARS
  }

  #[instrument(skip(self, text), fields(chars = text.chars().count()))]
  async fn send(&self, destination: &str, text: &str) -> Result<(), CallError> {
    let sent = self
      .http
      .post(&self.endpoint)
      .json(&SendMessage {
        chat_id: destination,
        text,
        disable_web_page_preview: true,
      })
      .send()
      .await;

    let body = read_json(DEPENDENCY, sent).await?;
    check_ack(&body)?;
    debug!("Message sent");
    Ok(())
  }
}

impl std::fmt::Debug for TelegramDelivery {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TelegramDelivery").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_endpoint_embeds_token_once() {
    let delivery = TelegramDelivery::new(Client::new(), "https://api.telegram.org/", "123:abc");
    assert_eq!(delivery.endpoint, "https://api.telegram.org/bot123:abc/sendMessage");
    assert!(!format!("{delivery:?}").contains("123:abc"));
  }

  #[tokio::test]
  async fn test_send_error_never_exposes_token() {
    let delivery = TelegramDelivery::new(Client::new(), "http://127.0.0.1:1", "123456:SECRET_TOKEN");

    let err = delivery.send("chat", "hi").await.unwrap_err();

    assert!(err.is_retryable());
    assert!(!err.to_string().contains("SECRET_TOKEN"), "{err}");
    assert!(!format!("{err:?}").contains("SECRET_TOKEN"), "{err:?}");
  }

  #[test]
  fn test_ack_ok() {
    assert!(check_ack(&json!({"ok": true, "result": {"message_id": 7}})).is_ok());
  }

  #[test]
  fn test_negative_ack_is_transport_error() {
    let err = check_ack(&json!({
      "ok": false,
      "error_code": 429,
      "description": "Too Many Requests: retry after 3"
    }))
    .unwrap_err();
    assert_eq!(
      err,
      CallError::transport("delivery", Some(429), "Too Many Requests: retry after 3")
    );
  }
}
