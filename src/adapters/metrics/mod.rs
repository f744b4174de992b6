//! Metrics and Monitoring Adapters
//!
//! Prometheus registry plus the axum 0.7 server that exposes it next to
//! the health probes and the manual `/run` trigger.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
