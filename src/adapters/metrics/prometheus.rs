//! Prometheus Metrics Registry - Run Observability
//!
//! Registers the bot's Prometheus metrics and renders them in the text
//! exposition format for the `/metrics` endpoint. Implements the
//! `RunObserver` port so every finished run updates the counters.

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::RunSummary;
use crate::ports::RunObserver;
use crate::resilience::CircuitState;

/// Centralized Prometheus metrics for the briefing bot.
///
/// All metrics follow the naming convention `briefing_bot_*`.
pub struct MetricsRegistry {
    registry: Registry,
    /// Runs by outcome (`ok`, `partial`, `failed`, `fatal`).
    pub runs_total: IntCounterVec,
    /// Items by final status (`succeeded`, `failed`).
    pub items_total: IntCounterVec,
    /// Run duration histogram (seconds).
    pub run_duration_seconds: HistogramVec,
    /// Breaker state per dependency (0 = closed, 1 = half-open, 2 = open).
    pub breaker_state: GaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let runs_total = IntCounterVec::new(
            Opts::new("briefing_bot_runs_total", "Pipeline runs by outcome"),
            &["outcome"],
        )?;

        let items_total = IntCounterVec::new(
            Opts::new("briefing_bot_items_total", "Per-coin briefings by status"),
            &["status"],
        )?;

        let run_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "briefing_bot_run_duration_seconds",
                "Wall-clock duration of pipeline runs",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["outcome"],
        )?;

        let breaker_state = GaugeVec::new(
            Opts::new(
                "briefing_bot_breaker_state",
                "Circuit breaker state (0=closed, 1=half-open, 2=open)",
            ),
            &["dependency"],
        )?;

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(items_total.clone()))?;
        registry.register(Box::new(run_duration_seconds.clone()))?;
        registry.register(Box::new(breaker_state.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            items_total,
            run_duration_seconds,
            breaker_state,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn outcome_label(summary: &RunSummary) -> &'static str {
    if summary.error.is_some() {
        "fatal"
    } else if summary.ok {
        "ok"
    } else if summary.succeeded.is_empty() {
        "failed"
    } else {
        "partial"
    }
}

impl RunObserver for MetricsRegistry {
    fn record_run(&self, summary: &RunSummary, breakers: &[(&str, CircuitState)]) {
        let outcome = outcome_label(summary);
        self.runs_total.with_label_values(&[outcome]).inc();
        self.run_duration_seconds
            .with_label_values(&[outcome])
            .observe(summary.duration_ms as f64 / 1000.0);

        self.items_total
            .with_label_values(&["succeeded"])
            .inc_by(summary.succeeded.len() as u64);
        self.items_total
            .with_label_values(&["failed"])
            .inc_by(summary.failed.len() as u64);

        for &(dependency, state) in breakers {
            self.breaker_state
                .with_label_values(&[dependency])
                .set(state.as_gauge());
        }
    }
}
