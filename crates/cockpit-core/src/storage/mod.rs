//! Storage Module
//!
//! SQLite access to the producer-owned tracker database:
//! - Connection management with WAL, busy timeout and stale-connection healing
//! - Per-kind insert/get/list/update over field maps
//! - Typed and column-driven row decoding
//! - Windowed per-app activity summaries

mod connection;
pub(crate) mod decode;
mod error;
mod records;
mod store;
mod summary;

pub use connection::Database;
pub use decode::DecodedRecord;
pub use error::{Result, StorageError};
pub use records::ListFilter;
pub use store::Store;
pub use summary::{ActivitySummary, AppUsage};
