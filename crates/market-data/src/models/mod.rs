//! Market data models
//!
//! - `market` - Exchange partitions (`Market`) and cache keys (`MarketSelector`)
//! - `quote` - Quote snapshot, recommendation tag and row normalization

mod market;
mod quote;

pub use market::{Market, MarketSelector};
pub use quote::{normalize_quotes, Quote, Recommendation};
