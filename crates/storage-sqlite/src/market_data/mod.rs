//! SQLite storage for the persisted stock quotes.

mod model;
mod repository;

pub use model::StockQuoteDB;
pub use repository::QuoteRepository;

// Re-export trait from core for convenience
pub use stockdash_core::quotes::QuoteStore;
