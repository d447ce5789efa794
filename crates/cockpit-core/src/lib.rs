//! # Cockpit Core
//!
//! Storage and search core for the Efficiency Cockpit productivity tracker.
//! The tracker's persistence framework owns the SQLite schema; this crate
//! reads and writes that schema without compile-time knowledge of its
//! entity tags and keeps full-text shadow indexes beside it.
//!
//! - **Connection Manager**: WAL mode, 5 s busy timeout, stale-connection healing
//! - **Schema Introspector**: runtime `Z_ENT` discovery with a per-connection cache
//! - **Record Access**: insert / get / list / update over field maps or typed entities
//! - **Shadow Indexes**: five FTS5 tables (porter + unicode61), synced on write,
//!   rebuilt and reconciled on demand
//! - **Activity Summary**: per-app totals over a time window
//! - **Query Engine**: substring scan, BM25-ranked search with snippets, and
//!   unified search with fallback
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cockpit_core::{EntityKind, SearchOptions, Store, Value};
//!
//! // Open the shared tracker database at its fixed location
//! let mut store = Store::open_default()?;
//!
//! let mut fields = cockpit_core::FieldMap::new();
//! fields.insert("title".into(), Value::from("Adopt JWT for sessions"));
//! let id = store.insert(EntityKind::Decision, fields);
//!
//! for hit in store.search_ranked("jwt", &SearchOptions::new()) {
//!     println!("{} {} {:?}", hit.kind, hit.id, hit.snippet);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): compile SQLite (with FTS5) into the binary

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod entities;
pub mod schema;
pub mod search;
pub mod storage;
pub mod value;

/// Builders for the producer-owned schema, for tests and scratch databases
pub mod fixture;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{DEFAULT_BUSY_TIMEOUT, DEFAULT_SCAN_CAP, StoreConfig, default_database_path};

pub use entities::{
    Activity, AiInteraction, ContentIndexEntry, ContextSnapshot, Decision, Entity, Insight,
};

pub use schema::{EntityKind, FieldType, SchemaIntrospector, SchemaReport, TableSpec, TableStatus};

pub use search::{SearchHit, SearchMode, SearchOptions, sanitize_fts5_query};

pub use storage::{
    ActivitySummary, AppUsage, Database, ListFilter, Result, Store, StorageError,
};

pub use value::{FieldMap, Value};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
