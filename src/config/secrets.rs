//! Provider Credentials - Loaded from Environment Variables
//!
//! API keys are never read from `config.toml`. They come from the
//! process environment (or a `.env` file sourced by the deployment):
//! - `LLM_API_KEY` (required)
//! - `TELEGRAM_BOT_TOKEN` (required)
//! - `NEWS_API_KEY` (optional, CryptoPanic auth token)

use anyhow::{Context, Result};

/// Credentials for the external providers.
#[derive(Clone)]
pub struct Secrets {
  /// Bearer token for the LLM endpoint.
  pub llm_api_key: String,
  /// Telegram bot token.
  pub telegram_bot_token: String,
  /// CryptoPanic auth token, if the account needs one.
  pub news_api_key: Option<String>,
}

impl Secrets {
  /// Load credentials from environment variables.
  pub fn from_env() -> Result<Self> {
    let llm_api_key = std::env::var("LLM_API_KEY").context("LLM_API_KEY not set")?;
    let telegram_bot_token =
      std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN not set")?;
    let news_api_key = std::env::var("NEWS_API_KEY")
      .ok()
      .filter(|k| !k.trim().is_empty());

    Ok(Self {
      llm_api_key,
      telegram_bot_token,
      news_api_key,
    })
  }
}

impl std::fmt::Debug for Secrets {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Secrets")
      .field("llm_api_key", &"<redacted>")
      .field("telegram_bot_token", &"<redacted>")
      .field("news_api_key", &self.news_api_key.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}
