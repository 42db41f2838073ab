//! Self-heal for an empty persisted store.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use stockdash_market_data::{normalize_quotes, LiveQuoteProvider, Market, MarketDataError, Quote};

use super::store::QuoteStore;
use crate::errors::{Error, Result};

/// Populates empty store partitions from the live provider.
#[derive(Clone)]
pub struct StoreSeeder {
    store: Arc<dyn QuoteStore>,
    provider: Arc<dyn LiveQuoteProvider>,
    timeout: Duration,
}

impl StoreSeeder {
    pub fn new(
        store: Arc<dyn QuoteStore>,
        provider: Arc<dyn LiveQuoteProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            timeout,
        }
    }

    /// Fetches and stores quotes for every market whose partition has no rows.
    ///
    /// Returns the number of rows written. Fails only when nothing could be
    /// written and at least one market failed.
    pub async fn populate_if_empty(&self) -> Result<usize> {
        let mut inserted = 0;
        let mut failures: Vec<MarketDataError> = Vec::new();

        for market in Market::ALL {
            let existing = self.store.count_for_market(market).await?;
            if existing > 0 {
                debug!("Store already holds {} {} rows", existing, market);
                continue;
            }

            info!(
                "Store partition {} is empty, populating from {}",
                market,
                self.provider.id()
            );
            match self.fetch(market).await {
                Ok(quotes) => inserted += self.store.upsert_quotes(quotes).await?,
                Err(e) => {
                    warn!("Could not populate {} quotes: {}", market, e);
                    failures.push(e);
                }
            }
        }

        if inserted == 0 {
            if let Some(first) = failures.into_iter().next() {
                return Err(Error::MarketData(first));
            }
        }
        Ok(inserted)
    }

    async fn fetch(&self, market: Market) -> std::result::Result<Vec<Quote>, MarketDataError> {
        let quotes = tokio::time::timeout(self.timeout, self.provider.fetch_quotes(market))
            .await
            .map_err(|_| MarketDataError::Timeout {
                market,
                timeout: self.timeout,
            })??;

        let quotes = normalize_quotes(market, quotes);
        if quotes.is_empty() {
            return Err(MarketDataError::EmptyResult { market });
        }
        Ok(quotes)
    }
}
