//! Quote storage trait.
//!
//! The persisted store holds one row per (market, symbol). It is partitioned
//! by [`Market`]; the `all` selector is a client-side union and never reaches
//! the store as a key.

use async_trait::async_trait;
use stockdash_market_data::{Market, Quote};

use crate::errors::Result;

/// Storage interface for the persisted quote dataset.
///
/// Implementations handle the actual database operations. Rows come back
/// ordered by symbol.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Returns every stored quote of one market partition.
    async fn quotes_for_market(&self, market: Market) -> Result<Vec<Quote>>;

    /// Counts the rows of one market partition.
    async fn count_for_market(&self, market: Market) -> Result<usize>;

    /// Inserts or replaces quotes keyed by (market, symbol).
    ///
    /// # Returns
    ///
    /// The number of rows written
    async fn upsert_quotes(&self, quotes: Vec<Quote>) -> Result<usize>;
}
