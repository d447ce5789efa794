//! Search Module
//!
//! Full-text shadow tables and the two search strategies over them:
//! - FTS5 shadow DDL, incremental sync, rebuild and orphan reconciliation
//! - Substring scan over the primary tables
//! - BM25-ranked FTS5 search with snippets
//! - Query sanitizing for FTS5 and LIKE

mod engine;
pub mod index;
pub mod query;

pub use engine::{DEFAULT_SEARCH_LIMIT, SearchHit, SearchMode, SearchOptions};
pub use query::{escape_like, like_contains_pattern, sanitize_fts5_query};
