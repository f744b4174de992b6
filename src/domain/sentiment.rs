//! News headlines and the aggregate market sentiment derived from them.
//!
//! The sentiment is the pipeline's shared context. When the model's
//! answer cannot be interpreted, `SentimentSnapshot::neutral()` is used
//! instead and flagged as degraded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PayloadError;

/// One news headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: Option<String>,
}

/// Extract up to `max` headlines from a CryptoPanic `/posts/` payload.
///
/// Entries without a title are skipped. A payload without a
/// `results` array is a parse error.
pub fn parse_headlines(payload: &Value, max: usize) -> Result<Vec<Headline>, PayloadError> {
    let results = payload
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| PayloadError::new("news payload has no `results` array"))?;

    Ok(results
        .iter()
        .filter_map(|post| {
            let title = post.get("title")?.as_str()?.trim();
            if title.is_empty() {
                return None;
            }
            let source = post
                .pointer("/source/title")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(Headline {
                title: title.to_string(),
                source,
            })
        })
        .take(max)
        .collect())
}

/// Coarse sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Bullish,
    Neutral,
    Bearish,
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Neutral => write!(f, "neutral"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

/// Aggregate news sentiment shared by every coin in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    /// Score in [-1, 1]; negative is bearish.
    pub score: f64,
    pub label: SentimentLabel,
    /// One-paragraph explanation from the model.
    pub summary: String,
    /// True when this is the neutral fallback rather than a parsed answer.
    #[serde(skip_deserializing)]
    pub degraded: bool,
}

impl SentimentSnapshot {
    /// Neutral fallback used when the sentiment can't be determined.
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
            summary: "Sentiment unavailable; assuming a neutral market mood.".to_string(),
            degraded: true,
        }
    }

    /// Parse the model's answer.
    ///
    /// Accepts a bare JSON object or one wrapped in prose or a code
    /// fence; the outermost `{ ... }` span is decoded. The score is
    /// clamped to [-1, 1].
    pub fn from_model_output(text: &str) -> Result<Self, PayloadError> {
        let start = text
            .find('{')
            .ok_or_else(|| PayloadError::new("no JSON object in sentiment answer"))?;
        let end = text
            .rfind('}')
            .filter(|end| *end > start)
            .ok_or_else(|| PayloadError::new("unterminated JSON object in sentiment answer"))?;

        let mut snapshot: Self = serde_json::from_str(&text[start..=end])
            .map_err(|e| PayloadError::new(format!("malformed sentiment JSON: {e}")))?;

        if !snapshot.score.is_finite() {
            return Err(PayloadError::new("sentiment score is not a number"));
        }
        snapshot.score = snapshot.score.clamp(-1.0, 1.0);
        snapshot.degraded = false;
        Ok(snapshot)
    }
}
