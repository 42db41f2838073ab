//! Stockdash SQLite Storage
//!
//! Diesel/SQLite implementation of the persisted quote store used by
//! `stockdash-core`.
//!
//! # Architecture
//!
//! ```text
//! stockdash-core (QuoteStore trait)
//!        ^
//!        |  implements
//!        |
//! stockdash-storage-sqlite (QuoteRepository)
//!        |
//!        +-- reads:  r2d2 pool, spawn_blocking
//!        +-- writes: single writer actor, immediate transactions
//! ```

pub mod db;
pub mod errors;
pub mod market_data;
pub mod schema;

pub use db::{create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer};
pub use db::{DbConnection, DbPool, WriteHandle};
pub use errors::{IntoCore, StorageError};
pub use market_data::{QuoteRepository, StockQuoteDB};
