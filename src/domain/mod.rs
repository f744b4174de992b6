//! Domain layer - Core payload types, formatting and chunking.
//!
//! Pure logic for the briefing bot: market and news payload parsing,
//! prompt and report text, run outcome types, and message chunking.
//! No I/O here (hexagonal architecture inner ring).

pub mod chunking;
pub mod market;
pub mod prompts;
pub mod report;
pub mod sentiment;

use thiserror::Error;

// Re-export core types for convenience
pub use chunking::split_into_chunks;
pub use market::MarketSnapshot;
pub use prompts::Prompt;
pub use report::{BatchResult, ItemOutcome, ItemStatus, RunSummary};
pub use sentiment::{Headline, SentimentLabel, SentimentSnapshot};

/// Item key: a CoinGecko coin id such as "bitcoin".
pub type CoinKey = String;

/// A provider payload that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PayloadError(String);

impl PayloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
