//! Run outcome types: per-coin outcomes and the aggregated batch result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::sentiment::SentimentSnapshot;
use super::CoinKey;

/// Final status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    Failed,
}

/// Outcome of processing one coin. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub item_key: CoinKey,
    pub status: ItemStatus,
    /// Originating cause when `status` is `Failed`.
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(item_key: impl Into<CoinKey>) -> Self {
        Self {
            item_key: item_key.into(),
            status: ItemStatus::Succeeded,
            error: None,
        }
    }

    pub fn failed(item_key: impl Into<CoinKey>, error: impl Into<String>) -> Self {
        Self {
            item_key: item_key.into(),
            status: ItemStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }
}

/// Aggregated result of one pipeline run.
///
/// Outcomes are kept in processing order, so `succeeded()` and
/// `failed()` preserve the configured coin order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Shared context the items were analysed against.
    pub sentiment: SentimentSnapshot,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchResult {
    /// Keys of items that completed every stage, in order.
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.item_key.as_str())
            .collect()
    }

    /// Keys of items that failed, in order.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.item_key.as_str())
            .collect()
    }

    /// Outcomes of failed items, in order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// True when no item failed.
    pub fn overall_ok(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_success)
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Compact, serializable view of a run for the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ok: bool,
    pub run_id: Option<Uuid>,
    pub succeeded: Vec<CoinKey>,
    pub failed: Vec<ItemOutcome>,
    /// Fatal error that aborted the run.
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Summary of a run that completed its shared stages.
    pub fn from_batch(result: &BatchResult) -> Self {
        Self {
            ok: result.overall_ok(),
            run_id: Some(result.run_id),
            succeeded: result.succeeded().into_iter().map(String::from).collect(),
            failed: result.failures().cloned().collect(),
            error: None,
            duration_ms: u64::try_from(result.duration().num_milliseconds()).unwrap_or(0),
        }
    }

    /// Summary of a run aborted before any item was processed.
    pub fn fatal(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            ok: false,
            run_id: None,
            succeeded: Vec::new(),
            failed: Vec::new(),
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// True when the run completed but some items failed.
    pub fn is_partial(&self) -> bool {
        self.error.is_none() && !self.failed.is_empty()
    }
}
