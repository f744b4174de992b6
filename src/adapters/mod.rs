//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `http`: shared reqwest client and the JSON `DataSource`
//! - `llm`: OpenAI-compatible chat completions `Analyst`
//! - `telegram`: Bot API `Delivery`
//! - `metrics`: Prometheus metrics, health probes and `/run`

pub mod http;
pub mod llm;
pub mod metrics;
pub mod telegram;
