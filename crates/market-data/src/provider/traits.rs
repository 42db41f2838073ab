//! Live quote provider trait definition.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Market, Quote};

/// Source of freshly fetched quotes for a market's symbol universe.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockdash_market_data::{LiveQuoteProvider, Market, MarketDataError, Quote};
///
/// struct StaticProvider(Vec<Quote>);
///
/// #[async_trait]
/// impl LiveQuoteProvider for StaticProvider {
///     fn id(&self) -> &'static str {
///         "STATIC"
///     }
///
///     async fn fetch_quotes(&self, market: Market) -> Result<Vec<Quote>, MarketDataError> {
///         Ok(self.0.iter().filter(|q| q.market == market).cloned().collect())
///     }
/// }
/// ```
#[async_trait]
pub trait LiveQuoteProvider: Send + Sync {
    /// Unique identifier for this provider, used in logs.
    fn id(&self) -> &'static str;

    /// Fetch current quotes for every symbol of `market`.
    ///
    /// May return fewer rows than the full universe. An empty vector is a
    /// valid transport-level answer; callers decide whether it is usable.
    async fn fetch_quotes(&self, market: Market) -> Result<Vec<Quote>, MarketDataError>;
}
