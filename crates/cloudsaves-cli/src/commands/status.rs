//! Status command - Show the last synchronization status
//!
//! Reads the sync status file and the local timestamp index; never touches
//! the storage.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use cloudsaves_core::config::Config;
use cloudsaves_core::ports::ITimestampIndex;
use cloudsaves_local::{FileTimestampIndex, SyncStatus, YamlSyncStatusStore};
use tracing::info;

use super::{format_bytes, load_config};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {}

/// Everything the status command reports
#[derive(Debug, Clone, PartialEq)]
struct StatusReport {
    status: SyncStatus,
    synced_saves: usize,
    pending_uploads: usize,
    saves_dir: String,
    remote: String,
}

impl StatusCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        info!(config_path = %config_path.display(), "Showing status");

        let report = collect(&config)?;

        if format.is_json() {
            formatter.print_json(&report.to_json());
        } else {
            report.display_human(formatter.as_ref());
        }
        Ok(())
    }
}

fn collect(config: &Config) -> Result<StatusReport> {
    let status = YamlSyncStatusStore::open(&config.sync.status_file)
        .context("Failed to read sync status")?
        .status();
    let timestamps = FileTimestampIndex::in_dir(&config.sync.saves_dir)
        .load()
        .context("Failed to read timestamp index")?;
    let pending_uploads = timestamps.values().filter(|ts| !ts.is_valid()).count();

    Ok(StatusReport {
        status,
        synced_saves: timestamps.len() - pending_uploads,
        pending_uploads,
        saves_dir: config.sync.saves_dir.display().to_string(),
        remote: format!(
            "{}{}",
            config.storage.root.display(),
            config.sync.normalized_remote_dir()
        ),
    })
}

impl StatusReport {
    fn display_human(&self, formatter: &dyn OutputFormatter) {
        match self.status.last_sync {
            Some(date) => formatter.success(&format!(
                "Last sync: {}",
                date.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            None => formatter.warn("Never synchronized"),
        }
        let used = self
            .status
            .used_space
            .map_or_else(|| "unknown".to_string(), format_bytes);
        formatter.info(&format!("Used space:  {}", used));
        formatter.info(&format!(
            "Local saves: {} synced, {} not yet uploaded",
            self.synced_saves, self.pending_uploads
        ));
        formatter.info(&format!("Save dir:    {}", self.saves_dir));
        formatter.info(&format!("Remote:      {}", self.remote));
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "last_sync": self.status.last_sync,
            "used_space": self.status.used_space,
            "synced_saves": self.synced_saves,
            "pending_uploads": self.pending_uploads,
            "saves_dir": self.saves_dir,
            "remote": self.remote,
        })
    }
}
