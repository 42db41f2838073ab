//! Serverless `market-data` function provider.
//!
//! The backend exposes quote fetching as a serverless function that proxies
//! the upstream market-data API. It is invoked with a POST body of
//! `{ "type": "stocks", "market": "us" | "saudi" }` and answers with
//! `{ "stocks": [...] }` or `{ "error": "..." }`.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{Market, Quote, Recommendation};
use crate::provider::LiveQuoteProvider;

use models::{ErrorResponse, StockItem, StocksRequest, StocksResponse};

const PROVIDER_ID: &str = "EDGE_FUNCTION";

/// Connection settings for the functions endpoint.
#[derive(Clone, Debug)]
pub struct EdgeFunctionConfig {
    /// Base URL of the functions runtime, e.g. `https://<project>.supabase.co/functions/v1`
    pub base_url: String,
    /// Name of the quotes function
    pub function_name: String,
    /// Anon or service key, sent as bearer token and `apikey` header
    pub api_key: Option<String>,
    /// Transport-level request timeout
    pub request_timeout: Duration,
}

impl Default for EdgeFunctionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321/functions/v1".to_string(),
            function_name: "market-data".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Live quote provider backed by the serverless function.
pub struct EdgeFunctionProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl EdgeFunctionProvider {
    pub fn new(config: EdgeFunctionConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: build_endpoint(&config.base_url, &config.function_name),
            api_key: config.api_key.filter(|k| !k.is_empty()),
            request_timeout: config.request_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LiveQuoteProvider for EdgeFunctionProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_quotes(&self, market: Market) -> Result<Vec<Quote>, MarketDataError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&StocksRequest::new(market));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        debug!("Invoking {} for market {}", self.endpoint, market);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    market,
                    timeout: self.request_timeout,
                }
            } else {
                MarketDataError::Network(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited { market });
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                market,
                message: error_message(status, &body),
            });
        }

        parse_stocks_response(market, &body, Utc::now())
    }
}

fn build_endpoint(base_url: &str, function_name: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        function_name.trim_start_matches('/')
    )
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        if let Some(message) = parsed.error.or(parsed.message) {
            return message;
        }
    }
    let snippet: String = body.chars().take(200).collect();
    format!("HTTP {} - {}", status, snippet)
}

/// Parses a function response body into quotes for `market`.
///
/// `received_at` stamps items that carry no usable `last_updated`.
pub(crate) fn parse_stocks_response(
    market: Market,
    body: &str,
    received_at: DateTime<Utc>,
) -> Result<Vec<Quote>, MarketDataError> {
    let response: StocksResponse = serde_json::from_str(body)
        .map_err(|e| MarketDataError::InvalidResponse(e.to_string()))?;

    if let Some(message) = response.error {
        return Err(MarketDataError::ProviderError { market, message });
    }

    let items = response.stocks.ok_or_else(|| {
        MarketDataError::InvalidResponse("missing `stocks` field".to_string())
    })?;

    Ok(items
        .into_iter()
        .filter_map(|item| convert_item(market, item, received_at))
        .collect())
}

fn convert_item(market: Market, item: StockItem, received_at: DateTime<Utc>) -> Option<Quote> {
    let symbol = item.symbol.map(|s| s.trim().to_string()).unwrap_or_default();
    if symbol.is_empty() {
        warn!("Skipping {} item without symbol", market);
        return None;
    }

    let price = match item.price.and_then(Decimal::from_f64) {
        Some(price) => price,
        None => {
            warn!("Skipping {} item {} without usable price", market, symbol);
            return None;
        }
    };

    let last_updated = item
        .last_updated
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(received_at);

    let decimal_or = |value: Option<f64>, fallback: Decimal| {
        value.and_then(Decimal::from_f64).unwrap_or(fallback)
    };

    Some(Quote {
        name: item.name.unwrap_or_else(|| symbol.clone()),
        symbol,
        market,
        price,
        change: decimal_or(item.change, Decimal::ZERO),
        change_percent: decimal_or(item.change_percent, Decimal::ZERO),
        volume: decimal_or(item.volume, Decimal::ZERO),
        high: decimal_or(item.high, price),
        low: decimal_or(item.low, price),
        open: decimal_or(item.open, price),
        recommendation: item
            .recommendation
            .as_deref()
            .map(Recommendation::parse_lossy)
            .unwrap_or_default(),
        rationale: item.rationale.unwrap_or_default(),
        last_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_build_endpoint_trims_slashes() {
        assert_eq!(
            build_endpoint("https://example.test/functions/v1/", "/market-data"),
            "https://example.test/functions/v1/market-data"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(StocksRequest::new(Market::Saudi)).unwrap();
        assert_eq!(body, serde_json::json!({ "type": "stocks", "market": "saudi" }));
    }

    #[test]
    fn test_parse_stocks_payload() {
        let body = r#"{
            "stocks": [
                {
                    "symbol": "AAPL",
                    "name": "Apple Inc.",
                    "price": 189.25,
                    "change": 1.5,
                    "changePercent": 0.8,
                    "volume": 51234000,
                    "high": 190.1,
                    "low": 187.0,
                    "open": 188.0,
                    "recommendation": "BUY",
                    "reason": "Momentum after earnings",
                    "lastUpdated": "2024-05-01T11:58:00Z"
                },
                { "symbol": "MSFT", "price": 410.0, "recommendation": "outperform" }
            ]
        }"#;

        let quotes = parse_stocks_response(Market::Us, body, received_at()).unwrap();

        assert_eq!(quotes.len(), 2);
        let apple = &quotes[0];
        assert_eq!(apple.price, dec!(189.25));
        assert_eq!(apple.change_percent, dec!(0.8));
        assert_eq!(apple.recommendation, Recommendation::Buy);
        assert_eq!(apple.rationale, "Momentum after earnings");
        assert_eq!(
            apple.last_updated,
            Utc.with_ymd_and_hms(2024, 5, 1, 11, 58, 0).unwrap()
        );

        let msft = &quotes[1];
        assert_eq!(msft.name, "MSFT");
        assert_eq!(msft.open, dec!(410));
        assert_eq!(msft.recommendation, Recommendation::Hold);
        assert_eq!(msft.last_updated, received_at());
    }

    #[test]
    fn test_parse_skips_items_without_symbol_or_price() {
        let body = r#"{ "stocks": [ { "price": 10.0 }, { "symbol": "2222" }, { "symbol": "1120", "price": 85.4 } ] }"#;
        let quotes = parse_stocks_response(Market::Saudi, body, received_at()).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "1120");
        assert_eq!(quotes[0].market, Market::Saudi);
    }

    #[test]
    fn test_parse_error_payload() {
        let body = r#"{ "error": "Upstream API limit reached" }"#;
        let err = parse_stocks_response(Market::Us, body, received_at()).unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::ProviderError { market: Market::Us, ref message } if message == "Upstream API limit reached"
        ));
    }

    #[test]
    fn test_parse_missing_stocks_field() {
        let err = parse_stocks_response(Market::Us, "{}", received_at()).unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_garbage_body() {
        let err = parse_stocks_response(Market::Us, "<html>", received_at()).unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidResponse(_)));
    }

    #[test]
    fn test_error_message_prefers_json_error() {
        let message = error_message(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{ "error": "boom" }"#,
        );
        assert_eq!(message, "boom");

        let message = error_message(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(message, "HTTP 502 Bad Gateway - upstream down");
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let provider = EdgeFunctionProvider::new(EdgeFunctionConfig {
            api_key: Some(String::new()),
            ..EdgeFunctionConfig::default()
        });
        assert!(provider.api_key.is_none());
        assert_eq!(
            provider.endpoint(),
            "http://localhost:54321/functions/v1/market-data"
        );
    }

    #[tokio::test]
    async fn test_transport_timeout_reports_configured_bound() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the connection and never answer.
        let silent = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let provider = EdgeFunctionProvider::new(EdgeFunctionConfig {
            base_url: format!("http://{}", addr),
            request_timeout: Duration::from_millis(50),
            ..EdgeFunctionConfig::default()
        });

        let err = provider.fetch_quotes(Market::Us).await.unwrap_err();
        match err {
            MarketDataError::Timeout { market, timeout } => {
                assert_eq!(market, Market::Us);
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        silent.abort();
    }
}
