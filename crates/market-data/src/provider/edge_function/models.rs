//! Request and response payloads of the `market-data` serverless function.

use serde::{Deserialize, Serialize};

use crate::models::Market;

/// Request body: `{ "type": "stocks", "market": "us" }`
#[derive(Debug, Serialize)]
pub struct StocksRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub market: Market,
}

impl StocksRequest {
    pub fn new(market: Market) -> Self {
        Self {
            kind: "stocks",
            market,
        }
    }
}

/// Response body: either `{ "stocks": [...] }` or `{ "error": "..." }`
#[derive(Debug, Deserialize)]
pub struct StocksResponse {
    pub stocks: Option<Vec<StockItem>>,
    pub error: Option<String>,
}

/// One quote as emitted by the function.
///
/// Every field is optional: the function blends upstream data with synthetic
/// fallbacks and the shape is not guaranteed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    #[serde(alias = "change_percent")]
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub recommendation: Option<String>,
    #[serde(alias = "reason", alias = "analysis")]
    pub rationale: Option<String>,
    #[serde(alias = "last_updated")]
    pub last_updated: Option<String>,
}

/// Error body returned with a non-success status.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
    pub message: Option<String>,
}
