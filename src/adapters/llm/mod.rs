//! Language Model Adapters
//!
//! `OpenAiAnalyst` implements the `Analyst` port against any
//! OpenAI-compatible chat completions endpoint.

pub mod openai;

pub use openai::OpenAiAnalyst;
