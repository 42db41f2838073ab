use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::market::Market;

/// Analyst-style recommendation attached to a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Recommendation {
    /// Parses a tag, mapping anything unrecognized to `Hold`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Recommendation::Buy,
            "sell" => Recommendation::Sell,
            _ => Recommendation::Hold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "buy",
            Recommendation::Sell => "sell",
            Recommendation::Hold => "hold",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(Recommendation::parse_lossy)
            .unwrap_or_default())
    }
}

/// A single stock's price/volume/recommendation snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Ticker, unique within its market
    pub symbol: String,

    /// Display name
    pub name: String,

    pub market: Market,

    /// Last traded price (never negative)
    pub price: Decimal,

    /// Absolute change since previous close
    #[serde(default)]
    pub change: Decimal,

    /// Percent change since previous close
    #[serde(default, alias = "change_percent")]
    pub change_percent: Decimal,

    #[serde(default)]
    pub volume: Decimal,

    #[serde(default)]
    pub high: Decimal,

    #[serde(default)]
    pub low: Decimal,

    #[serde(default)]
    pub open: Decimal,

    #[serde(default)]
    pub recommendation: Recommendation,

    /// Free-text rationale for the recommendation
    #[serde(default, alias = "reason")]
    pub rationale: String,

    /// When the upstream last refreshed this row
    #[serde(alias = "last_updated")]
    pub last_updated: DateTime<Utc>,
}

impl Quote {
    /// Create a quote with the required fields; session values default to zero.
    pub fn new(
        market: Market,
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market,
            price,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: Decimal::ZERO,
            high: price,
            low: price,
            open: price,
            recommendation: Recommendation::Hold,
            rationale: String::new(),
            last_updated,
        }
    }
}

/// Normalizes raw rows for one market.
///
/// Stamps `market`, drops rows with an empty symbol or a negative price,
/// keeps the most recently updated row per symbol and orders by symbol.
pub fn normalize_quotes(market: Market, quotes: Vec<Quote>) -> Vec<Quote> {
    let mut by_symbol: HashMap<String, Quote> = HashMap::with_capacity(quotes.len());

    for mut quote in quotes {
        quote.symbol = quote.symbol.trim().to_string();
        if quote.symbol.is_empty() {
            warn!("Dropping {} quote with empty symbol", market);
            continue;
        }
        if quote.price < Decimal::ZERO {
            warn!(
                "Dropping {} quote {} with negative price {}",
                market, quote.symbol, quote.price
            );
            continue;
        }
        quote.market = market;

        match by_symbol.get(&quote.symbol) {
            Some(existing) if existing.last_updated >= quote.last_updated => {}
            _ => {
                by_symbol.insert(quote.symbol.clone(), quote);
            }
        }
    }

    let mut normalized: Vec<Quote> = by_symbol.into_values().collect();
    normalized.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    normalized
}
