//! Stock quote acquisition.
//!
//! - [`cache`] - In-process cache entries keyed by market selector
//! - [`store`] - Storage trait for the persisted quote dataset
//! - [`acquisition`] - The staleness/refresh state machine
//! - [`subscription`] - Live views handed to consumers
//! - [`seed`] - Best-effort population of an empty store
//! - [`inflight`] - Keyed deduplication of concurrent work
//!
//! # Architecture
//!
//! ```text
//! QuoteSubscriptions → QuoteAcquisitionService → QuoteCache (memory)
//!                                ↓                    ↓
//!                         QuoteStore (DB)      LiveQuoteProvider (HTTP)
//! ```
//!
//! A request is served from memory while the entry is fresh, from the
//! persisted store while it holds usable rows, and from the live provider
//! otherwise. Stale store data is served immediately and refreshed in the
//! background.

pub mod acquisition;
pub mod cache;
pub mod config;
pub mod constants;
pub mod inflight;
pub mod merge;
pub mod seed;
pub mod store;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

pub use acquisition::{AcquisitionOutcome, DataSource, QuoteAcquisitionService};
pub use cache::{CacheEntry, CacheEntrySummary, QuoteCache};
pub use config::AcquisitionConfig;
pub use inflight::{InFlight, TaskFailed};
pub use seed::StoreSeeder;
pub use store::QuoteStore;
pub use subscription::{MarketQuotes, QuoteSubscriptions, QuotesView};
