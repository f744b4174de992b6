//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages
//! for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{AppConfig, DependencyConfig};

/// Environment variable overriding `service.chat_id`.
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// Load and validate configuration from a TOML file.
///
/// A missing file is not an error: every setting falls back to its
/// default and a warning is logged.
///
/// # Errors
/// Returns detailed error if:
/// - The file exists but can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let mut config = if path.exists() {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)?
  } else {
    warn!(path = %path.display(), "Config file not found, using defaults");
    AppConfig::default()
  };

  if let Ok(chat_id) = std::env::var(CHAT_ID_ENV) {
    if !chat_id.trim().is_empty() {
      config.service.chat_id = chat_id.trim().to_string();
    }
  }

  validate_config(&config)?;

  info!(
    coins = config.pipeline.coins.len(),
    schedule_enabled = config.schedule.enabled,
    interval_seconds = config.schedule.interval_seconds,
    max_chunk_chars = config.emitter.max_chunk_chars,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).context("Failed to parse config.toml")
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A non-empty, duplicate-free coin list
/// - Positive retry, breaker and rate-limit values
/// - A chunk size the chunker can honour under Telegram's 4096 limit
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Pipeline validation
  anyhow::ensure!(
    !config.pipeline.coins.is_empty(),
    "At least one coin must be configured"
  );
  for (i, coin) in config.pipeline.coins.iter().enumerate() {
    anyhow::ensure!(!coin.trim().is_empty(), "Coin {i} has an empty id");
    anyhow::ensure!(
      !config.pipeline.coins[..i].contains(coin),
      "Coin {coin} is listed more than once"
    );
  }

  // Schedule validation
  anyhow::ensure!(
    !config.schedule.enabled || config.schedule.interval_seconds > 0,
    "schedule.interval_seconds must be positive"
  );

  // Emitter validation
  anyhow::ensure!(
    config.emitter.max_chunk_chars > 200 && config.emitter.max_chunk_chars <= 4096,
    "emitter.max_chunk_chars must be in (200, 4096], got {}",
    config.emitter.max_chunk_chars
  );

  // Dependency validation
  let deps = &config.dependencies;
  for (name, dep) in [
    ("market", &deps.market),
    ("news", &deps.news),
    ("llm", &deps.llm),
    ("delivery", &deps.delivery),
  ] {
    validate_dependency(name, dep)?;
  }

  // API validation
  anyhow::ensure!(config.api.timeout_seconds > 0, "api.timeout_seconds must be positive");
  anyhow::ensure!(!config.api.llm_model.is_empty(), "api.llm_model must not be empty");

  Ok(())
}

fn validate_dependency(name: &str, dep: &DependencyConfig) -> Result<()> {
  anyhow::ensure!(
    dep.max_attempts >= 1,
    "dependencies.{name}.max_attempts must be at least 1"
  );
  anyhow::ensure!(
    dep.failure_threshold >= 1,
    "dependencies.{name}.failure_threshold must be at least 1"
  );
  if let Some(rl) = &dep.rate_limit {
    anyhow::ensure!(
      rl.max_requests > 0 && rl.window_ms > 0,
      "dependencies.{name}.rate_limit needs positive max_requests and window_ms"
    );
  }
  Ok(())
}
