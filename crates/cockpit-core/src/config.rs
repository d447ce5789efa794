//! Store configuration
//!
//! The database lives at a fixed per-user location; callers only override it
//! for tests and scratch databases.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use crate::storage::{Result, StorageError};

/// File name of the shared tracker database
pub const DATABASE_FILE_NAME: &str = "cockpit.sqlite";

/// How long a blocked writer waits before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Rows examined per kind by the substring scan
pub const DEFAULT_SCAN_CAP: usize = 500;

/// Knobs for opening a [`Store`](crate::Store)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub scan_cap: usize,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            scan_cap: DEFAULT_SCAN_CAP,
        }
    }

    /// Configuration pointing at the fixed per-user database.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(default_database_path()?))
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_scan_cap(mut self, cap: usize) -> Self {
        self.scan_cap = cap.max(1);
        self
    }
}

/// Per-user application-data directory of the tracker
pub fn default_data_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "efficiency-cockpit", "cockpit").ok_or_else(|| {
        StorageError::connection(DATABASE_FILE_NAME, "Could not determine project directories")
    })?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Fixed location of the shared database file
pub fn default_database_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join(DATABASE_FILE_NAME))
}
