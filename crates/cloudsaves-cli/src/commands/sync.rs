//! Sync command - Synchronize saves with the storage
//!
//! Provides the `cloudsaves sync` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Creates the filesystem adapters (save store, index, status, storage)
//! 3. Drives one SyncOrchestrator run, showing progress as it goes
//! 4. Displays the summary
//!
//! Ctrl-C cancels the run; a partially downloaded save is deleted before the
//! command exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use cloudsaves_core::config::Config;
use cloudsaves_local::{FileTimestampIndex, FolderStorage, FsSaveStore, YamlSyncStatusStore};
use cloudsaves_sync::filter::SyncFilter;
use cloudsaves_sync::{SyncOrchestrator, SyncSnapshot, SyncSummary};
use tracing::{info, warn};

use super::{format_bytes, load_config, plural};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local save directory (overrides sync.saves_dir)
    #[arg(long)]
    pub saves_dir: Option<PathBuf>,

    /// Storage folder (overrides storage.root)
    #[arg(long)]
    pub storage_root: Option<PathBuf>,
}

impl SyncCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let mut config = load_config(config_path)?;
        self.apply_overrides(&mut config);

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            bail!(
                "Configuration has {} error{}",
                errors.len(),
                plural(errors.len())
            );
        }
        info!(config_path = %config_path.display(), "Loaded configuration");

        let mut orchestrator = build_orchestrator(&config)?;

        formatter.info(&format!(
            "Syncing {} with {}{}",
            config.sync.saves_dir.display(),
            config.storage.root.display(),
            config.sync.normalized_remote_dir()
        ));

        let started = Instant::now();
        let mut snapshots = orchestrator.subscribe();
        let mut reporter = ProgressReporter::default();
        orchestrator.start();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let outcome = loop {
            tokio::select! {
                outcome = orchestrator.pump() => break outcome,
                _ = &mut ctrl_c => {
                    warn!("Interrupted, cancelling sync");
                    orchestrator.cancel();
                    break None;
                }
                Ok(()) = snapshots.changed() => {
                    let snapshot = snapshots.borrow_and_update().clone();
                    if let Some(line) = reporter.update(&snapshot) {
                        formatter.progress(&line);
                    }
                }
            }
        };

        let Some(outcome) = outcome else {
            formatter.warn("Sync cancelled");
            return Ok(());
        };
        let summary = outcome.context("Sync failed")?;
        display_summary(formatter.as_ref(), format, &summary, started.elapsed());
        Ok(())
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.saves_dir {
            config.sync.saves_dir = dir.clone();
        }
        if let Some(root) = &self.storage_root {
            config.storage.root = root.clone();
        }
    }
}

/// Wire the filesystem adapters into an orchestrator
fn build_orchestrator(config: &Config) -> Result<SyncOrchestrator> {
    let saves = FsSaveStore::open(&config.sync.saves_dir).context("Failed to open save directory")?;
    let index = FileTimestampIndex::in_dir(saves.dir());
    let status = YamlSyncStatusStore::open(&config.sync.status_file)
        .context("Failed to open sync status file")?;
    let storage = FolderStorage::new(&config.storage.root)
        .with_stream_uploads(config.storage.stream_uploads);

    Ok(SyncOrchestrator::new(
        Arc::new(storage),
        Arc::new(index),
        Arc::new(saves),
        Arc::new(status),
        config.sync.remote_dir.clone(),
    )
    .with_filter(SyncFilter::new(config.filters.exclude.as_slice())))
}

// ============================================================================
// Progress and summary display
// ============================================================================

/// Turns snapshots into progress lines, skipping ones that add nothing
#[derive(Debug, Default)]
struct ProgressReporter {
    last: Option<(String, usize)>,
}

impl ProgressReporter {
    fn update(&mut self, snapshot: &SyncSnapshot) -> Option<String> {
        if snapshot.phase.is_terminal() {
            return None;
        }
        let key = (
            snapshot.phase.to_string(),
            snapshot.files_to_download.len(),
        );
        if self.last.as_ref() == Some(&key) {
            return None;
        }
        self.last = Some(key);

        let mut line = format!("{} ({:.0}%)", snapshot.phase, snapshot.progress * 100.0);
        let downloading = &snapshot.downloading;
        if downloading.in_progress {
            line.push_str(&format!(
                ", {} of {} file{} downloaded, {} of {}",
                downloading.files_downloaded,
                downloading.files_to_download,
                plural(downloading.files_to_download),
                format_bytes(downloading.bytes_downloaded),
                format_bytes(downloading.bytes_to_download)
            ));
        }
        Some(line)
    }
}

fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

fn summary_lines(summary: &SyncSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.files_downloaded > 0 {
        lines.push(format!(
            "Downloaded: {} file{} ({})",
            summary.files_downloaded,
            plural(summary.files_downloaded),
            format_bytes(summary.bytes_downloaded)
        ));
    }
    if summary.files_uploaded > 0 {
        lines.push(format!(
            "Uploaded:   {} file{}",
            summary.files_uploaded,
            plural(summary.files_uploaded)
        ));
    }
    lines.push(format!(
        "Last sync:  {}",
        summary.last_sync.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines
}

fn display_summary(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    summary: &SyncSummary,
    elapsed: Duration,
) {
    if format.is_json() {
        let mut json = serde_json::to_value(summary).unwrap_or_default();
        if let Some(object) = json.as_object_mut() {
            object.insert("duration_ms".into(), serde_json::json!(elapsed.as_millis() as u64));
        }
        formatter.print_json(&json);
        return;
    }

    if summary.files_downloaded + summary.files_uploaded == 0 {
        formatter.success("Already up to date");
    } else {
        formatter.success(&format!("Sync completed in {}", format_duration(elapsed)));
    }
    for line in summary_lines(summary) {
        formatter.info(&line);
    }
}
