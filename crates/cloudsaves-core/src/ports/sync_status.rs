//! Sync status port
//!
//! Records the outcome facts a UI shows about the storage: when the last
//! successful sync happened and how much space the synced files take.

use chrono::{DateTime, Utc};

/// Sink for per-storage sync status
pub trait ISyncStatusStore: Send + Sync {
    /// Record the date of the last successful sync run
    fn set_last_sync(&self, date: DateTime<Utc>) -> anyhow::Result<()>;

    /// Record the total size of the remote save files
    fn set_used_space(&self, bytes: u64) -> anyhow::Result<()>;
}
