//! Live quote provider abstraction and implementations.
//!
//! - The `LiveQuoteProvider` trait the cache layer calls into
//! - `edge_function`: the serverless `market-data` function over HTTP
//!
//! Providers are treated as black boxes: they may blend real upstream data
//! with synthetic values, and they may return partial or empty results when
//! the upstream is rate limited. Timeouts are applied by the caller.

pub mod edge_function;
mod traits;

pub use traits::LiveQuoteProvider;
