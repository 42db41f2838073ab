//! Stockdash Market Data Crate
//!
//! Provider-agnostic quote types and the live quote provider abstraction used
//! by the Stockdash quote cache.
//!
//! # Overview
//!
//! - Two exchange partitions (`us`, `saudi`) plus the client-side `all` union
//! - One live provider: the serverless `market-data` function, reached over HTTP
//! - A single error taxonomy for provider failures
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +--------------------+
//! |  MarketSelector  | --> |  Market (us/saudi) |  (fan-out for `all`)
//! +------------------+     +--------------------+
//!                                   |
//!                                   v
//!                        +---------------------+
//!                        |  LiveQuoteProvider  |  (EdgeFunctionProvider)
//!                        +---------------------+
//!                                   |
//!                                   v
//!                        +---------------------+
//!                        |       Quote         |  (normalized snapshot)
//!                        +---------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Market`] - A persisted exchange partition
//! - [`MarketSelector`] - A cache key: one market or the `all` union
//! - [`Quote`] - Price/volume/recommendation snapshot for one symbol
//! - [`Recommendation`] - `buy` / `sell` / `hold`

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::MarketDataError;

pub use models::{normalize_quotes, Market, MarketSelector, Quote, Recommendation};

pub use provider::edge_function::{EdgeFunctionConfig, EdgeFunctionProvider};
pub use provider::LiveQuoteProvider;
