//! Crypto Briefing Bot - Entry Point
//!
//! Initializes configuration, logging and the provider adapters, then
//! runs the briefing pipeline on a schedule and on demand. Runs until
//! SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (or `$CONFIG_PATH`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load provider credentials from env vars
//! 4. Create the shared HTTP client and the three adapters
//! 5. Build per-dependency guards, the chunked emitter and the pipeline
//! 6. Wrap the pipeline in a serialized trigger reporting to Prometheus
//! 7. Spawn the health/metrics/trigger server
//! 8. Spawn the scheduler
//! 9. Wait for SIGINT → graceful shutdown
//!
//! With both the scheduler and the server disabled the bot runs the
//! pipeline once and exits.

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crypto_briefing_bot::adapters::http::{build_client, HttpDataSource};
use crypto_briefing_bot::adapters::llm::OpenAiAnalyst;
use crypto_briefing_bot::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use crypto_briefing_bot::adapters::telegram::TelegramDelivery;
use crypto_briefing_bot::config::{self, secrets::Secrets};
use crypto_briefing_bot::ports::RunTrigger;
use crypto_briefing_bot::resilience::ResilientDependency;
use crypto_briefing_bot::usecases::{
    run_schedule, BatchPipeline, ChunkedEmitter, Dependencies, PipelineSettings, PipelineTrigger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        coins = config.pipeline.coins.len(),
        schedule_enabled = config.schedule.enabled,
        server_enabled = config.server.enabled,
        "Starting crypto briefing bot"
    );

    // ── 3. Credentials ──────────────────────────────────────
    let secrets = Secrets::from_env().context("Failed to load provider credentials from env")?;
    anyhow::ensure!(
        !config.service.chat_id.is_empty(),
        "service.chat_id (or TELEGRAM_CHAT_ID) must be set"
    );
    if secrets.news_api_key.is_none() {
        warn!("NEWS_API_KEY not set, requesting public news feed only");
    }

    // ── 4. Adapters ─────────────────────────────────────────
    let http = build_client(Duration::from_secs(config.api.timeout_seconds))?;
    let source = Arc::new(HttpDataSource::new(http.clone()));
    let analyst = Arc::new(OpenAiAnalyst::from_config(
        http.clone(),
        &config.api,
        secrets.llm_api_key.clone(),
    ));
    let delivery = Arc::new(TelegramDelivery::new(
        http,
        &config.api.telegram_url,
        &secrets.telegram_bot_token,
    ));

    // ── 5. Pipeline ─────────────────────────────────────────
    let emitter = ChunkedEmitter::from_config(
        delivery,
        ResilientDependency::from_config("delivery", &config.dependencies.delivery),
        &config.emitter,
    );
    let pipeline = Arc::new(BatchPipeline::new(
        source,
        analyst,
        emitter,
        Dependencies::from_config(&config.dependencies),
        PipelineSettings::from_config(&config, secrets.news_api_key.clone()),
    ));

    // ── 6. Trigger + metrics ────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let trigger: Arc<dyn RunTrigger> =
        Arc::new(PipelineTrigger::new(pipeline).with_observer(metrics.clone()));

    if !config.schedule.enabled && !config.server.enabled {
        info!("Scheduler and server disabled, running once");
        let summary = trigger.run_once().await;
        info!(ok = summary.ok, "Single run complete");
        anyhow::ensure!(summary.error.is_none(), "run aborted: {}", summary.error.unwrap_or_default());
        return Ok(());
    }

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());

    // ── 7. Health / metrics / trigger server ────────────────
    let server_handle = config.server.enabled.then(|| {
        let server = HealthServer::new(
            Arc::clone(&health),
            Arc::clone(&metrics),
            Arc::clone(&trigger),
            config.server.bind_address.clone(),
        );
        let server_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        })
    });

    // ── 8. Scheduler ────────────────────────────────────────
    let scheduler_handle = config.schedule.enabled.then(|| {
        tokio::spawn(run_schedule(
            Arc::clone(&trigger),
            config.schedule.clone(),
            shutdown_tx.subscribe(),
        ))
    });

    info!("All tasks spawned, bot is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    health.mark_not_ready();
    let _ = shutdown_tx.send(());

    // A run in progress is allowed to finish its current coin sequence.
    if let Some(handle) = scheduler_handle {
        if tokio::time::timeout(Duration::from_secs(120), handle).await.is_err() {
            warn!("Scheduler did not stop within 120s");
        }
    }
    if let Some(handle) = server_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
