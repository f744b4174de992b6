//! Market snapshot for a single coin.
//!
//! Parsed from CoinGecko's `/coins/markets` response, which is a JSON
//! array with one object per requested coin id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CoinKey, PayloadError};

/// Point-in-time market data for one coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// CoinGecko id (e.g. "bitcoin").
    pub id: CoinKey,
    /// Ticker symbol (e.g. "btc").
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Last price in the quote currency.
    pub current_price: f64,
    /// 24h price change in percent.
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    /// 24h traded volume.
    #[serde(default)]
    pub total_volume: Option<f64>,
    /// Market capitalisation.
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// 24h high.
    #[serde(default)]
    pub high_24h: Option<f64>,
    /// 24h low.
    #[serde(default)]
    pub low_24h: Option<f64>,
}

impl MarketSnapshot {
    /// Pick the entry for `coin` out of a `/coins/markets` payload.
    pub fn from_markets_payload(coin: &str, payload: &Value) -> Result<Self, PayloadError> {
        let entries = payload
            .as_array()
            .ok_or_else(|| PayloadError::new("expected a JSON array of markets"))?;

        let entry = entries
            .iter()
            .find(|e| e.get("id").and_then(Value::as_str) == Some(coin))
            .ok_or_else(|| PayloadError::new(format!("no market entry for {coin}")))?;

        let snapshot: Self = serde_json::from_value(entry.clone())
            .map_err(|e| PayloadError::new(format!("malformed market entry for {coin}: {e}")))?;

        if !snapshot.current_price.is_finite() || snapshot.current_price <= 0.0 {
            return Err(PayloadError::new(format!(
                "non-positive price {} for {coin}",
                snapshot.current_price
            )));
        }

        Ok(snapshot)
    }

    /// Direction arrow for the 24h change.
    pub fn trend_marker(&self) -> &'static str {
        match self.price_change_percentage_24h {
            Some(p) if p > 0.0 => "📈",
            Some(p) if p < 0.0 => "📉",
            _ => "➖",
        }
    }
}
