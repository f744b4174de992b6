//! Batch Pipeline - Shared Context + Isolated Per-Coin Briefings
//!
//! One run:
//! 1. Shared stages: fetch news, ask the LLM for aggregate sentiment.
//!    Exhausted retries or an open breaker here abort the whole run.
//! 2. Unparsable news or sentiment degrades to a neutral sentiment.
//! 3. For each coin, in configured order and one at a time: fetch
//!    market data → LLM analysis → deliver the report. A failure is
//!    recorded for that coin and the run moves on.
//! 4. Send a summary (or an all-failed alert) and return the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

use crate::config::{AppConfig, DependenciesConfig};
use crate::domain::prompts::{
  analysis_prompt, format_failure_alert, format_fatal_alert, format_report, format_summary,
  sentiment_prompt,
};
use crate::domain::sentiment::parse_headlines;
use crate::domain::{BatchResult, CoinKey, ItemOutcome, MarketSnapshot, SentimentSnapshot};
use crate::ports::{Analyst, DataRequest, DataSource, Delivery};
use crate::resilience::{CallError, CircuitState, ResilientDependency};

use super::emitter::{ChunkedEmitter, EmitError};

/// A shared stage failed: nothing was processed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
  #[error("shared stage `{stage}` failed: {source}")]
  Fatal {
    stage: &'static str,
    #[source]
    source: CallError,
  },
}

impl PipelineError {
  /// Name of the shared stage that failed.
  pub const fn stage(&self) -> &'static str {
    match self {
      Self::Fatal { stage, .. } => stage,
    }
  }

  /// The dependency error that ended the run.
  pub const fn cause(&self) -> &CallError {
    match self {
      Self::Fatal { source, .. } => source,
    }
  }
}

/// Why one coin's stage sequence failed.
#[derive(Debug, Error)]
pub enum ItemError {
  #[error("{stage}: {source}")]
  Stage {
    stage: &'static str,
    #[source]
    source: CallError,
  },
  #[error("report delivery: {0}")]
  Delivery(#[from] EmitError),
}

impl ItemError {
  fn stage(stage: &'static str) -> impl FnOnce(CallError) -> Self {
    move |source| Self::Stage { stage, source }
  }

  /// Dependency that produced the originating error.
  pub fn dependency(&self) -> &str {
    match self {
      Self::Stage { source, .. } => source.dependency(),
      Self::Delivery(e) => e.source.dependency(),
    }
  }
}

/// Per-dependency guards used by the pipeline's own stages.
#[derive(Debug)]
pub struct Dependencies {
  pub market: ResilientDependency,
  pub news: ResilientDependency,
  pub llm: ResilientDependency,
}

impl Dependencies {
  /// Build the guards from `[dependencies.*]`.
  pub fn from_config(config: &DependenciesConfig) -> Self {
    Self {
      market: ResilientDependency::from_config("market", &config.market),
      news: ResilientDependency::from_config("news", &config.news),
      llm: ResilientDependency::from_config("llm", &config.llm),
    }
  }
}

/// What the pipeline processes and where it sends the results.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
  /// Coins in processing order.
  pub coins: Vec<CoinKey>,
  pub vs_currency: String,
  pub inter_item_delay: Duration,
  pub max_headlines: usize,
  /// Chat that receives reports and alerts.
  pub destination: String,
  /// CoinGecko base URL.
  pub market_url: String,
  /// CryptoPanic posts endpoint.
  pub news_url: String,
  pub news_api_key: Option<String>,
}

impl PipelineSettings {
  /// Derive settings from the app config.
  pub fn from_config(config: &AppConfig, news_api_key: Option<String>) -> Self {
    Self {
      coins: config.pipeline.coins.clone(),
      vs_currency: config.pipeline.vs_currency.clone(),
      inter_item_delay: Duration::from_millis(config.pipeline.inter_item_delay_ms),
      max_headlines: config.pipeline.max_headlines,
      destination: config.service.chat_id.clone(),
      market_url: config.api.market_url.trim_end_matches('/').to_string(),
      news_url: config.api.news_url.clone(),
      news_api_key,
    }
  }
}

/// Drives shared and per-coin stages over the configured coins.
pub struct BatchPipeline<S: DataSource, A: Analyst, D: Delivery> {
  source: Arc<S>,
  analyst: Arc<A>,
  emitter: ChunkedEmitter<D>,
  deps: Dependencies,
  settings: PipelineSettings,
}

impl<S: DataSource, A: Analyst, D: Delivery> BatchPipeline<S, A, D> {
  pub fn new(
    source: Arc<S>,
    analyst: Arc<A>,
    emitter: ChunkedEmitter<D>,
    deps: Dependencies,
    settings: PipelineSettings,
  ) -> Self {
    Self {
      source,
      analyst,
      emitter,
      deps,
      settings,
    }
  }

  pub const fn settings(&self) -> &PipelineSettings {
    &self.settings
  }

  /// Current breaker state of every dependency, for metrics.
  pub fn breaker_states(&self) -> Vec<(&str, CircuitState)> {
    [
      &self.deps.market,
      &self.deps.news,
      &self.deps.llm,
      self.emitter.dependency(),
    ]
    .into_iter()
    .map(|dep| (dep.name(), dep.breaker().state()))
    .collect()
  }

  /// Execute one full run.
  ///
  /// Returns `Err` only when a shared stage fails; per-coin failures
  /// are reported inside the `BatchResult`.
  #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
  pub async fn run(&self) -> Result<BatchResult, PipelineError> {
    let run_id = Uuid::new_v4();
    Span::current().record("run_id", tracing::field::display(run_id));
    let started_at = Utc::now();

    info!(coins = self.settings.coins.len(), "Pipeline run started");

    let sentiment = match self.shared_context().await {
      Ok(sentiment) => sentiment,
      Err(e) => {
        error!(
          stage = e.stage(),
          dependency = e.cause().dependency(),
          error = %e,
          "Shared stage failed, aborting run"
        );
        self.alert_fatal(&e).await;
        return Err(e);
      }
    };

    let mut outcomes = Vec::with_capacity(self.settings.coins.len());
    for (i, coin) in self.settings.coins.iter().enumerate() {
      if i > 0 {
        sleep(self.settings.inter_item_delay).await;
      }

      match self.process_item(coin, &sentiment).await {
        Ok(segments) => {
          info!(coin = %coin, segments, "Coin briefing delivered");
          outcomes.push(ItemOutcome::succeeded(coin.clone()));
        }
        Err(e) => {
          error!(
            coin = %coin,
            dependency = e.dependency(),
            error = %e,
            "Coin briefing failed, continuing with next coin"
          );
          outcomes.push(ItemOutcome::failed(coin.clone(), e.to_string()));
        }
      }
    }

    let result = BatchResult {
      run_id,
      started_at,
      finished_at: Utc::now(),
      sentiment,
      outcomes,
    };

    self.notify(&result).await;

    info!(
      succeeded = result.succeeded().len(),
      failed = result.failed().len(),
      overall_ok = result.overall_ok(),
      "Pipeline run finished"
    );

    Ok(result)
  }

  /// News → sentiment. Transport failures are fatal, parse failures degrade.
  async fn shared_context(&self) -> Result<SentimentSnapshot, PipelineError> {
    let request = self.news_request();
    let payload = self
      .deps
      .news
      .call(|| self.source.fetch(&request))
      .await
      .map_err(|source| PipelineError::Fatal {
        stage: "news",
        source,
      })?;

    let headlines = match parse_headlines(&payload, self.settings.max_headlines) {
      Ok(headlines) if !headlines.is_empty() => headlines,
      Ok(_) => {
        warn!("No usable headlines, using neutral sentiment");
        return Ok(SentimentSnapshot::neutral());
      }
      Err(e) => {
        warn!(error = %e, "Unparsable news payload, using neutral sentiment");
        return Ok(SentimentSnapshot::neutral());
      }
    };

    let prompt = sentiment_prompt(&headlines);
    let answer = self
      .deps
      .llm
      .call(|| self.analyst.complete(&prompt))
      .await
      .map_err(|source| PipelineError::Fatal {
        stage: "sentiment",
        source,
      })?;

    match SentimentSnapshot::from_model_output(&answer) {
      Ok(sentiment) => {
        info!(
          label = %sentiment.label,
          score = sentiment.score,
          headlines = headlines.len(),
          "Market sentiment synthesized"
        );
        Ok(sentiment)
      }
      Err(e) => {
        warn!(error = %e, "Unparsable sentiment answer, using neutral sentiment");
        Ok(SentimentSnapshot::neutral())
      }
    }
  }

  /// Market data → analysis → delivery for one coin.
  #[instrument(skip(self, sentiment))]
  async fn process_item(
    &self,
    coin: &str,
    sentiment: &SentimentSnapshot,
  ) -> Result<usize, ItemError> {
    let request = self.market_request(coin);
    let payload = self
      .deps
      .market
      .call(|| self.source.fetch(&request))
      .await
      .map_err(ItemError::stage("market data"))?;

    let market = MarketSnapshot::from_markets_payload(coin, &payload)
      .map_err(|e| CallError::parse("market", e.to_string()))
      .map_err(ItemError::stage("market data"))?;

    let prompt = analysis_prompt(&market, sentiment, &self.settings.vs_currency);
    let analysis = self
      .deps
      .llm
      .call(|| self.analyst.complete(&prompt))
      .await
      .map_err(ItemError::stage("analysis"))?;
    if analysis.trim().is_empty() {
      return Err(ItemError::Stage {
        stage: "analysis",
        source: CallError::parse("llm", "empty analysis"),
      });
    }

    let report = format_report(&market, &analysis, &self.settings.vs_currency);
    Ok(self.emitter.emit(&self.settings.destination, &report).await?)
  }

  /// Summary when something succeeded, an alert when nothing did.
  async fn notify(&self, result: &BatchResult) {
    let text = if !result.succeeded().is_empty() {
      format_summary(result)
    } else if !result.outcomes.is_empty() {
      format_failure_alert(result)
    } else {
      return;
    };

    if let Err(e) = self.emitter.emit(&self.settings.destination, &text).await {
      error!(error = %e, "Run summary notification failed");
    }
  }

  async fn alert_fatal(&self, error: &PipelineError) {
    let text = format_fatal_alert(error.stage(), &error.cause().to_string());
    if let Err(e) = self.emitter.emit(&self.settings.destination, &text).await {
      error!(error = %e, "Fatal-run alert could not be delivered");
    }
  }

  fn news_request(&self) -> DataRequest {
    let request = DataRequest::new("news", self.settings.news_url.clone())
      .param("public", "true")
      .param("kind", "news");
    match &self.settings.news_api_key {
      Some(key) => request.param("auth_token", key.clone()),
      None => request,
    }
  }

  fn market_request(&self, coin: &str) -> DataRequest {
    DataRequest::new("market", format!("{}/coins/markets", self.settings.market_url))
      .param("vs_currency", self.settings.vs_currency.clone())
      .param("ids", coin)
      .param("price_change_percentage", "24h")
  }
}
