//! OpenAI-compatible chat completions client.
//!
//! Sends the prompt as a system + user message pair and returns
//! `choices[0].message.content`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::adapters::http::read_json;
use crate::config::ApiConfig;
use crate::domain::Prompt;
use crate::ports::Analyst;
use crate::resilience::CallError;

const DEPENDENCY: &str = "llm";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  temperature: f32,
  messages: [ChatMessage<'a>; 2],
}

/// `Analyst` backed by a chat completions endpoint.
pub struct OpenAiAnalyst {
  http: Client,
  url: String,
  api_key: String,
  model: String,
  temperature: f32,
}

impl OpenAiAnalyst {
  pub fn new(
    http: Client,
    url: impl Into<String>,
    api_key: impl Into<String>,
    model: impl Into<String>,
    temperature: f32,
  ) -> Self {
    Self {
      http,
      url: url.into(),
      api_key: api_key.into(),
      model: model.into(),
      temperature,
    }
  }

  /// Build from the `[api]` section and the LLM key.
  pub fn from_config(http: Client, config: &ApiConfig, api_key: impl Into<String>) -> Self {
    Self::new(
      http,
      config.llm_url.clone(),
      api_key,
      config.llm_model.clone(),
      config.llm_temperature,
    )
  }

  fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
    ChatRequest {
      model: &self.model,
      temperature: self.temperature,
      messages: [
        ChatMessage {
          role: "system",
          content: &prompt.system,
        },
        ChatMessage {
          role: "user",
          content: &prompt.user,
        },
      ],
    }
  }
}

/// Extract the answer text from a chat completions response.
fn answer_text(body: &Value) -> Result<String, CallError> {
  body
    .pointer("/choices/0/message/content")
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| CallError::parse(DEPENDENCY, "response has no choices[0].message.content"))
}

#[async_trait]
impl Analyst for OpenAiAnalyst {
  #[instrument(skip_all, fields(model = %self.model))]
  async fn complete(&self, prompt: &Prompt) -> Result<String, CallError> {
    let sent = self
      .http
      .post(&self.url)
      .bearer_auth(&self.api_key)
      .json(&self.request_body(prompt))
      .send()
      .await;

    let body = read_json(DEPENDENCY, sent).await?;
    let answer = answer_text(&body)?;
    debug!(chars = answer.chars().count(), "Completion received");
    Ok(answer)
  }
}

impl std::fmt::Debug for OpenAiAnalyst {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OpenAiAnalyst")
      .field("url", &self.url)
      .field("model", &self.model)
      .field("temperature", &self.temperature)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn analyst() -> OpenAiAnalyst {
    OpenAiAnalyst::new(Client::new(), "http://localhost/v1/chat", "sk-test", "gpt-4o-mini", 0.3)
  }

  #[test]
  fn test_request_body_shape() {
    let analyst = analyst();
    let prompt = Prompt {
      system: "sys".into(),
      user: "usr".into(),
    };
    let body = serde_json::to_value(analyst.request_body(&prompt)).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "sys"}));
    assert_eq!(body["messages"][1], json!({"role": "user", "content": "usr"}));
  }

  #[test]
  fn test_answer_text_reads_first_choice() {
    let body = json!({"choices": [{"message": {"role": "assistant", "content": "Bias: wait"}}]});
    assert_eq!(answer_text(&body).unwrap(), "Bias: wait");
  }

  #[test]
  fn test_missing_choice_is_parse_error() {
    let err = answer_text(&json!({"choices": []})).unwrap_err();
    assert!(matches!(err, CallError::Parse { .. }));
    assert!(err.is_retryable());
  }

  #[test]
  fn test_debug_hides_key() {
    assert!(!format!("{:?}", analyst()).contains("sk-test"));
  }
}
