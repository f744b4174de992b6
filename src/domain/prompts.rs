//! Prompt construction and report formatting.
//!
//! Plain string building; no I/O.

use std::fmt::Write as _;

use serde::Serialize;

use super::market::MarketSnapshot;
use super::report::BatchResult;
use super::sentiment::{Headline, SentimentSnapshot};

/// A system + user message pair for the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SENTIMENT_SYSTEM: &str = "You are a crypto market news analyst. \
Read the headlines and rate the aggregate market sentiment. \
Answer with a single JSON object and nothing else: \
{\"score\": <number from -1 (very bearish) to 1 (very bullish)>, \
\"label\": \"bullish\" | \"neutral\" | \"bearish\", \
\"summary\": \"<two sentences>\"}";

const ANALYSIS_SYSTEM: &str = "You are a disciplined crypto trading analyst. \
Given market data and the prevailing news sentiment, write a concise briefing \
for a Telegram channel: trend, key levels, risks, and a short-term bias \
(long / short / wait) with a one-line rationale. Plain text, no markdown tables. \
This is not financial advice.";

/// Prompt asking for the aggregate sentiment of `headlines`.
pub fn sentiment_prompt(headlines: &[Headline]) -> Prompt {
    let mut user = String::from("Headlines:\n");
    for (i, h) in headlines.iter().enumerate() {
        match &h.source {
            Some(source) => {
                let _ = writeln!(user, "{}. {} ({source})", i + 1, h.title);
            }
            None => {
                let _ = writeln!(user, "{}. {}", i + 1, h.title);
            }
        }
    }
    Prompt {
        system: SENTIMENT_SYSTEM.to_string(),
        user,
    }
}

/// Prompt asking for a trading briefing on one coin.
pub fn analysis_prompt(
    market: &MarketSnapshot,
    sentiment: &SentimentSnapshot,
    vs_currency: &str,
) -> Prompt {
    let quote = vs_currency.to_uppercase();
    let mut user = String::new();
    let _ = writeln!(user, "Coin: {} ({})", market.name, market.symbol.to_uppercase());
    let _ = writeln!(user, "Price: {} {quote}", format_price(market.current_price));
    let _ = writeln!(user, "24h change: {}", format_optional_pct(market.price_change_percentage_24h));
    let _ = writeln!(user, "24h high: {}", format_optional_price(market.high_24h));
    let _ = writeln!(user, "24h low: {}", format_optional_price(market.low_24h));
    let _ = writeln!(user, "24h volume: {}", format_optional_compact(market.total_volume));
    let _ = writeln!(user, "Market cap: {}", format_optional_compact(market.market_cap));
    let _ = writeln!(
        user,
        "News sentiment: {} (score {:+.2}): {}",
        sentiment.label, sentiment.score, sentiment.summary
    );
    Prompt {
        system: ANALYSIS_SYSTEM.to_string(),
        user,
    }
}

/// Telegram report for one coin.
pub fn format_report(market: &MarketSnapshot, analysis: &str, vs_currency: &str) -> String {
    format!(
        "{} {} ({})\n{} {} | 24h {}\n\n{}\n",
        market.trend_marker(),
        market.name,
        market.symbol.to_uppercase(),
        format_price(market.current_price),
        vs_currency.to_uppercase(),
        format_optional_pct(market.price_change_percentage_24h),
        analysis.trim()
    )
}

/// End-of-run summary listing successes and failures.
pub fn format_summary(result: &BatchResult) -> String {
    let mut text = String::from("📊 Briefing run complete\n");
    let _ = writeln!(
        text,
        "Sentiment: {} ({:+.2}){}",
        result.sentiment.label,
        result.sentiment.score,
        if result.sentiment.degraded { " [fallback]" } else { "" }
    );
    let _ = writeln!(text, "✅ Delivered: {}", join_or_none(&result.succeeded()));
    if !result.overall_ok() {
        let _ = writeln!(text, "❌ Failed:");
        for failure in result.failures() {
            let _ = writeln!(
                text,
                "  • {}: {}",
                failure.item_key,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    let _ = write!(text, "Run {}", result.run_id);
    text
}

/// Operator alert for a run in which no coin could be delivered.
pub fn format_failure_alert(result: &BatchResult) -> String {
    let mut text = String::from("🚨 Briefing run failed for every coin\n");
    for failure in result.failures() {
        let _ = writeln!(
            text,
            "  • {}: {}",
            failure.item_key,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    let _ = write!(text, "Run {}", result.run_id);
    text
}

/// Operator alert for a run aborted in a shared stage.
pub fn format_fatal_alert(stage: &str, error: &str) -> String {
    format!("🚨 Briefing run aborted during {stage}: {error}\nNo coins were processed.")
}

fn join_or_none(keys: &[&str]) -> String {
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.join(", ")
    }
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.6}")
    }
}

fn format_optional_price(price: Option<f64>) -> String {
    price.map_or_else(|| "n/a".to_string(), format_price)
}

fn format_optional_pct(pct: Option<f64>) -> String {
    pct.map_or_else(|| "n/a".to_string(), |p| format!("{p:+.2}%"))
}

fn format_optional_compact(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 1e12 => format!("{:.2}T", v / 1e12),
        Some(v) if v >= 1e9 => format!("{:.2}B", v / 1e9),
        Some(v) if v >= 1e6 => format!("{:.2}M", v / 1e6),
        Some(v) => format!("{v:.0}"),
        None => "n/a".to_string(),
    }
}
