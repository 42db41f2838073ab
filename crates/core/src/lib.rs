//! Stockdash Core - quote cache, acquisition orchestration and subscriptions.
//!
//! This crate contains the business logic of the stock-quote layer.
//! It is database-agnostic and defines the [`quotes::QuoteStore`] trait that is
//! implemented by the `storage-sqlite` crate, and consumes live data through
//! [`stockdash_market_data::LiveQuoteProvider`].

pub mod errors;
pub mod quotes;
pub mod utils;

// Re-export error types
pub use errors::DatabaseError;
pub use errors::Error;
pub use errors::Result;

pub use quotes::{
    AcquisitionConfig, AcquisitionOutcome, CacheEntry, CacheEntrySummary, DataSource,
    MarketQuotes, QuoteAcquisitionService, QuoteCache, QuoteStore, QuoteSubscriptions,
    QuotesView, StoreSeeder,
};
pub use utils::time_utils::{Clock, ManualClock, SystemClock};
