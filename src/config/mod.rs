//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for secrets and the chat target.
//! Every field has a default, so a missing file or a missing key
//! falls back to the documented values.

pub mod loader;
pub mod secrets;

use serde::Deserialize;

use crate::resilience::Backoff;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Bot identity and delivery target.
  pub service: ServiceConfig,
  /// Coins and pacing for the batch pipeline.
  pub pipeline: PipelineConfig,
  /// Periodic trigger.
  pub schedule: ScheduleConfig,
  /// HTTP trigger, probes and metrics.
  pub server: ServerConfig,
  /// Provider endpoints.
  pub api: ApiConfig,
  /// Message chunking and pacing.
  pub emitter: EmitterConfig,
  /// Retry, breaker and rate-limit settings per dependency.
  pub dependencies: DependenciesConfig,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Human-readable bot name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
  /// Telegram chat that receives reports (`TELEGRAM_CHAT_ID` overrides).
  pub chat_id: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: "crypto-briefing-bot".to_string(),
      log_level: "info".to_string(),
      chat_id: String::new(),
    }
  }
}

/// Batch pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// CoinGecko coin ids, processed in this order.
  pub coins: Vec<String>,
  /// Quote currency for market data.
  pub vs_currency: String,
  /// Pause between items (milliseconds).
  pub inter_item_delay_ms: u64,
  /// Maximum headlines fed into the sentiment prompt.
  pub max_headlines: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      coins: ["bitcoin", "ethereum", "solana", "ripple", "cardano"]
        .into_iter()
        .map(str::to_string)
        .collect(),
      vs_currency: "usd".to_string(),
      inter_item_delay_ms: 600,
      max_headlines: 20,
    }
  }
}

/// Periodic trigger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
  /// Run the pipeline on a fixed interval.
  pub enabled: bool,
  /// Interval between runs (seconds).
  pub interval_seconds: u64,
  /// Run once immediately at startup.
  pub run_on_start: bool,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      interval_seconds: 4 * 60 * 60,
      run_on_start: false,
    }
  }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Serve `/run`, `/live`, `/ready` and `/metrics`.
  pub enabled: bool,
  /// Bind address.
  pub bind_address: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:8080".to_string(),
    }
  }
}

/// Provider endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// CoinGecko REST base URL.
  pub market_url: String,
  /// CryptoPanic posts endpoint.
  pub news_url: String,
  /// OpenAI-compatible chat completions endpoint.
  pub llm_url: String,
  /// Model name sent to the LLM endpoint.
  pub llm_model: String,
  /// Sampling temperature for the LLM.
  pub llm_temperature: f32,
  /// Telegram Bot API base URL.
  pub telegram_url: String,
  /// Per-request timeout (seconds).
  pub timeout_seconds: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      market_url: "https://api.coingecko.com/api/v3".to_string(),
      news_url: "https://cryptopanic.com/api/v1/posts/".to_string(),
      llm_url: "https://api.openai.com/v1/chat/completions".to_string(),
      llm_model: "gpt-4o-mini".to_string(),
      llm_temperature: 0.3,
      telegram_url: "https://api.telegram.org".to_string(),
      timeout_seconds: 30,
    }
  }
}

/// Chunked emitter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
  /// Maximum characters per message (Telegram hard limit is 4096).
  pub max_chunk_chars: usize,
  /// Pause between segments of one payload (milliseconds).
  pub segment_pause_ms: u64,
}

impl Default for EmitterConfig {
  fn default() -> Self {
    Self {
      max_chunk_chars: 3900,
      segment_pause_ms: 250,
    }
  }
}

/// Sliding-window rate limit for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
  /// Calls admitted per window.
  pub max_requests: usize,
  /// Window length (milliseconds).
  pub window_ms: u64,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      max_requests: 10,
      window_ms: 60_000,
    }
  }
}

/// Resolved guard settings for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConfig {
  /// Attempts per call including the first.
  pub max_attempts: u32,
  /// Backoff base (milliseconds).
  pub base_backoff_ms: u64,
  /// Backoff schedule.
  pub backoff: Backoff,
  /// Consecutive failures before the breaker opens.
  pub failure_threshold: u32,
  /// Breaker cool-down (milliseconds).
  pub reset_timeout_ms: u64,
  /// Sliding-window limit, if the dependency is rate limited.
  pub rate_limit: Option<RateLimitConfig>,
}

impl DependencyConfig {
  const fn base(backoff: Backoff, base_backoff_ms: u64, rate_limit: Option<RateLimitConfig>) -> Self {
    Self {
      max_attempts: 3,
      base_backoff_ms,
      backoff,
      failure_threshold: 5,
      reset_timeout_ms: 60_000,
      rate_limit,
    }
  }

  /// Market data: exponential backoff, 10 calls / minute.
  pub fn market() -> Self {
    Self::base(Backoff::Exponential, 1000, Some(RateLimitConfig::default()))
  }

  /// News: exponential backoff, 10 calls / minute.
  pub fn news() -> Self {
    Self::base(Backoff::Exponential, 1000, Some(RateLimitConfig::default()))
  }

  /// LLM: linear backoff, not rate limited.
  pub const fn llm() -> Self {
    Self::base(Backoff::Linear, 2000, None)
  }

  /// Telegram: linear backoff, paced by the emitter instead of a limiter.
  pub const fn delivery() -> Self {
    Self::base(Backoff::Linear, 1000, None)
  }
}

/// Guard settings for every dependency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "DependenciesPatch")]
pub struct DependenciesConfig {
  pub market: DependencyConfig,
  pub news: DependencyConfig,
  pub llm: DependencyConfig,
  pub delivery: DependencyConfig,
}

impl Default for DependenciesConfig {
  fn default() -> Self {
    Self {
      market: DependencyConfig::market(),
      news: DependencyConfig::news(),
      llm: DependencyConfig::llm(),
      delivery: DependencyConfig::delivery(),
    }
  }
}

// Raw `[dependencies.*]` sections. Keys left out fall back to the
// defaults of that particular dependency, not to a shared default.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DependenciesPatch {
  market: DependencyPatch,
  news: DependencyPatch,
  llm: DependencyPatch,
  delivery: DependencyPatch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DependencyPatch {
  max_attempts: Option<u32>,
  base_backoff_ms: Option<u64>,
  backoff: Option<Backoff>,
  failure_threshold: Option<u32>,
  reset_timeout_ms: Option<u64>,
  rate_limit: Option<RateLimitPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RateLimitPatch {
  enabled: Option<bool>,
  max_requests: Option<usize>,
  window_ms: Option<u64>,
}

impl DependencyPatch {
  fn apply(self, base: DependencyConfig) -> DependencyConfig {
    let rate_limit = match self.rate_limit {
      None => base.rate_limit,
      Some(RateLimitPatch { enabled: Some(false), .. }) => None,
      Some(patch) => {
        let fallback = base.rate_limit.unwrap_or_default();
        Some(RateLimitConfig {
          max_requests: patch.max_requests.unwrap_or(fallback.max_requests),
          window_ms: patch.window_ms.unwrap_or(fallback.window_ms),
        })
      }
    };

    DependencyConfig {
      max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
      base_backoff_ms: self.base_backoff_ms.unwrap_or(base.base_backoff_ms),
      backoff: self.backoff.unwrap_or(base.backoff),
      failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
      reset_timeout_ms: self.reset_timeout_ms.unwrap_or(base.reset_timeout_ms),
      rate_limit,
    }
  }
}

impl From<DependenciesPatch> for DependenciesConfig {
  fn from(patch: DependenciesPatch) -> Self {
    Self {
      market: patch.market.apply(DependencyConfig::market()),
      news: patch.news.apply(DependencyConfig::news()),
      llm: patch.llm.apply(DependencyConfig::llm()),
      delivery: patch.delivery.apply(DependencyConfig::delivery()),
    }
  }
}
