use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::SqliteConnection;
use log::{debug, warn};

use stockdash_core::quotes::QuoteStore;
use stockdash_core::Result;
use stockdash_market_data::{Market, Quote};

use super::model::StockQuoteDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::stock_quotes::dsl;

pub struct QuoteRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl QuoteRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Runs a read on a pooled connection off the async runtime.
    async fn read<T, F>(&self, query: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            query(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl QuoteStore for QuoteRepository {
    async fn quotes_for_market(&self, market: Market) -> Result<Vec<Quote>> {
        let rows = self
            .read(move |conn| {
                dsl::stock_quotes
                    .filter(dsl::market.eq(market.as_str()))
                    .order(dsl::symbol.asc())
                    .select(StockQuoteDB::as_select())
                    .load::<StockQuoteDB>(conn)
                    .into_core()
            })
            .await?;

        debug!("Loaded {} {} rows from stock_quotes", rows.len(), market);
        // One undecodable row must not hide the rest of the partition.
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Quote::try_from(row)
                    .map_err(|e| warn!("Skipping unreadable {} quote: {}", market, e))
                    .ok()
            })
            .collect())
    }

    async fn count_for_market(&self, market: Market) -> Result<usize> {
        let count = self
            .read(move |conn| {
                dsl::stock_quotes
                    .filter(dsl::market.eq(market.as_str()))
                    .count()
                    .get_result::<i64>(conn)
                    .into_core()
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn upsert_quotes(&self, quotes: Vec<Quote>) -> Result<usize> {
        if quotes.is_empty() {
            return Ok(0);
        }

        let rows: Vec<StockQuoteDB> = quotes.iter().map(StockQuoteDB::from).collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for row in &rows {
                    written += diesel::insert_into(dsl::stock_quotes)
                        .values(row)
                        .on_conflict((dsl::market, dsl::symbol))
                        .do_update()
                        .set((
                            dsl::name.eq(excluded(dsl::name)),
                            dsl::price.eq(excluded(dsl::price)),
                            dsl::change.eq(excluded(dsl::change)),
                            dsl::change_percent.eq(excluded(dsl::change_percent)),
                            dsl::volume.eq(excluded(dsl::volume)),
                            dsl::high.eq(excluded(dsl::high)),
                            dsl::low.eq(excluded(dsl::low)),
                            dsl::open.eq(excluded(dsl::open)),
                            dsl::recommendation.eq(excluded(dsl::recommendation)),
                            dsl::rationale.eq(excluded(dsl::rationale)),
                            dsl::last_updated.eq(excluded(dsl::last_updated)),
                        ))
                        .execute(conn)
                        .into_core()?;
                }
                Ok(written)
            })
            .await
    }
}
