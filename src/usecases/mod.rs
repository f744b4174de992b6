//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the bot's workflows. Each use case is a self-contained
//! operation.
//!
//! Use cases:
//! - `ChunkedEmitter`: Ordered delivery of oversized messages
//! - `BatchPipeline`: Shared context + isolated per-coin briefings
//! - `PipelineTrigger`: Serialized on-demand runs (`RunTrigger` port)
//! - `run_schedule`: Interval-driven runs until shutdown

pub mod emitter;
pub mod pipeline;
pub mod scheduler;
pub mod trigger;

pub use emitter::{ChunkedEmitter, EmitError};
pub use pipeline::{BatchPipeline, Dependencies, ItemError, PipelineError, PipelineSettings};
pub use scheduler::run_schedule;
pub use trigger::PipelineTrigger;
