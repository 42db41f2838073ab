//! Database model for persisted stock quotes.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use stockdash_core::errors::{DatabaseError, Error, Result};
use stockdash_market_data::{Market, Quote, Recommendation};

/// One row of `stock_quotes`. Decimals and timestamps are kept as text.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::stock_quotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StockQuoteDB {
    pub symbol: String,
    pub market: String,
    pub name: String,
    pub price: String,
    pub change: String,
    pub change_percent: String,
    pub volume: String,
    pub high: String,
    pub low: String,
    pub open: String,
    pub recommendation: String,
    pub rationale: String,
    pub last_updated: String,
}

impl From<&Quote> for StockQuoteDB {
    fn from(quote: &Quote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            market: quote.market.as_str().to_string(),
            name: quote.name.clone(),
            price: quote.price.to_string(),
            change: quote.change.to_string(),
            change_percent: quote.change_percent.to_string(),
            volume: quote.volume.to_string(),
            high: quote.high.to_string(),
            low: quote.low.to_string(),
            open: quote.open.to_string(),
            recommendation: quote.recommendation.as_str().to_string(),
            rationale: quote.rationale.clone(),
            // Fixed-width UTC so lexical order matches time order.
            last_updated: quote
                .last_updated
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl TryFrom<StockQuoteDB> for Quote {
    type Error = Error;

    fn try_from(db: StockQuoteDB) -> Result<Self> {
        let market = Market::from_str(&db.market).map_err(|e| corrupt(&db.symbol, e))?;
        let last_updated = DateTime::parse_from_rfc3339(&db.last_updated)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(&db.symbol, e))?;

        Ok(Quote {
            price: decimal(&db.symbol, &db.price)?,
            change: decimal(&db.symbol, &db.change)?,
            change_percent: decimal(&db.symbol, &db.change_percent)?,
            volume: decimal(&db.symbol, &db.volume)?,
            high: decimal(&db.symbol, &db.high)?,
            low: decimal(&db.symbol, &db.low)?,
            open: decimal(&db.symbol, &db.open)?,
            recommendation: Recommendation::parse_lossy(&db.recommendation),
            symbol: db.symbol,
            name: db.name,
            market,
            rationale: db.rationale,
            last_updated,
        })
    }
}

fn decimal(symbol: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| corrupt(symbol, e))
}

fn corrupt(symbol: &str, cause: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::CorruptValue(format!(
        "stock_quotes row {}: {}",
        symbol, cause
    )))
}
