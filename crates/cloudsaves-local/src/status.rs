//! YAML sync status store
//!
//! Keeps the date of the last successful sync and the storage's used space in
//! a small YAML file, rewritten atomically on each update:
//!
//! ```yaml
//! last_sync: 2024-05-01T10:00:00Z
//! used_space: 123456
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use chrono::{DateTime, Utc};
use cloudsaves_core::ports::ISyncStatusStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::atomic::write_atomically;

/// Persisted sync status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncStatus {
    pub last_sync: Option<DateTime<Utc>>,
    pub used_space: Option<u64>,
}

/// Status file backed [`ISyncStatusStore`]
#[derive(Debug)]
pub struct YamlSyncStatusStore {
    path: PathBuf,
    status: Mutex<SyncStatus>,
}

impl YamlSyncStatusStore {
    /// Load the status file at `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let status = match std::fs::read_to_string(&path) {
            Ok(text) => serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse status file {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => SyncStatus::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read status file {}", path.display()))
            }
        };
        Ok(Self {
            path,
            status: Mutex::new(status),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current status
    pub fn status(&self) -> SyncStatus {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SyncStatus> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, apply: impl FnOnce(&mut SyncStatus)) -> anyhow::Result<()> {
        let mut status = self.lock();
        apply(&mut *status);
        let yaml = serde_yaml::to_string(&*status).context("Failed to serialize sync status")?;
        write_atomically(&self.path, yaml.as_bytes())
            .with_context(|| format!("Failed to write status file {}", self.path.display()))
    }
}

impl ISyncStatusStore for YamlSyncStatusStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn set_last_sync(&self, date: DateTime<Utc>) -> anyhow::Result<()> {
        self.update(|status| status.last_sync = Some(date))?;
        debug!("last sync date recorded");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn set_used_space(&self, bytes: u64) -> anyhow::Result<()> {
        self.update(|status| status.used_space = Some(bytes))?;
        debug!("used space recorded");
        Ok(())
    }
}
