//! Error types for the market data crate.
//!
//! [`MarketDataError`] covers every way a live quote fetch can fail. The
//! [`is_transient`](MarketDataError::is_transient) classification tells
//! callers whether a later retry has a chance of succeeding.

use std::time::Duration;

use thiserror::Error;

use crate::models::Market;

/// Errors that can occur while fetching quotes from the live provider.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider answered with an explicit error payload or a non-success status.
    #[error("Provider error for {market}: {message}")]
    ProviderError {
        /// The market being fetched
        market: Market,
        /// The error message from the provider
        message: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited while fetching {market}")]
    RateLimited {
        /// The market being fetched
        market: Market,
    },

    /// The provider did not answer within the configured bound.
    #[error("Timed out after {timeout:?} fetching {market}")]
    Timeout {
        /// The market being fetched
        market: Market,
        /// The bound that elapsed
        timeout: Duration,
    },

    /// The provider answered successfully but returned zero usable quotes.
    /// Never used to overwrite existing data.
    #[error("No quotes returned for {market}")]
    EmptyResult {
        /// The market being fetched
        market: Market,
    },

    /// The response body could not be interpreted.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// An unknown market identifier was supplied.
    #[error("Invalid market: {0}")]
    InvalidMarket(String),

    /// A network error occurred while communicating with the provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The task driving a fetch panicked or was cancelled.
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

impl MarketDataError {
    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }
}
