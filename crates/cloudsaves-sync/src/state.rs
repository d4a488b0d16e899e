//! Working set of one sync run
//!
//! [`SyncState`] holds the download and upload queues, the file currently in
//! flight, the local timestamp index being updated, and the counters the
//! progress measures are computed from. It is rebuilt at the start of every
//! run and owned by the [`SyncMachine`](crate::machine::SyncMachine).
//!
//! ## Design Notes
//!
//! - Queues are drained from the back; file order is not significant.
//! - A file is queued, in flight, or processed. Taking the next file moves it
//!   from its queue into the in-flight slot; completing it clears the slot.
//! - `total_files_to_handle` is frozen once, after diffing. Before that it is
//!   `None` and every progress measure reports 0.

use chrono::{DateTime, Utc};
use cloudsaves_core::domain::{RemoteFile, Timestamp, TimestampMap};
use serde::Serialize;

use crate::policy::SyncPlan;

/// Download-phase counters for UI consumption
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadingInfo {
    /// Bytes downloaded so far, including the in-flight file's progress
    pub bytes_downloaded: u64,
    /// Total bytes the run downloads
    pub bytes_to_download: u64,
    /// Files fully downloaded
    pub files_downloaded: usize,
    /// Total files the run downloads
    pub files_to_download: usize,
    /// Whether downloads remain (queued or in flight)
    pub in_progress: bool,
}

/// Mutable working set of a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    download_queue: Vec<RemoteFile>,
    upload_queue: Vec<String>,
    current_download: Option<RemoteFile>,
    current_upload: Option<String>,
    local_timestamps: TimestampMap,
    total_files_to_handle: Option<usize>,
    files_to_download: usize,
    files_downloaded: usize,
    files_uploaded: usize,
    bytes_to_download: u64,
    bytes_downloaded: u64,
    current_fraction: f64,
    date: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Fresh state for a run starting from `local_timestamps`
    pub fn new(local_timestamps: TimestampMap) -> Self {
        Self {
            local_timestamps,
            ..Self::default()
        }
    }

    // ========================================================================
    // Transitions (driven by the machine)
    // ========================================================================

    pub(crate) fn set_date(&mut self, date: Option<DateTime<Utc>>) {
        self.date = date;
    }

    /// Load the queues from a plan and freeze the totals
    pub(crate) fn apply_plan(&mut self, plan: SyncPlan) {
        self.bytes_to_download = plan.bytes_to_download();
        self.bytes_downloaded = 0;
        self.files_to_download = plan.downloads.len();
        self.files_downloaded = 0;
        self.files_uploaded = 0;
        self.total_files_to_handle = Some(plan.len());
        self.download_queue = plan.downloads;
        self.upload_queue = plan.uploads;
    }

    /// Move the next queued download into flight
    pub(crate) fn next_download(&mut self) -> Option<RemoteFile> {
        self.current_fraction = 0.0;
        self.current_download = self.download_queue.pop();
        self.current_download.clone()
    }

    /// Record the in-flight download as done
    pub(crate) fn complete_download(&mut self) -> Option<RemoteFile> {
        let file = self.current_download.take()?;
        self.local_timestamps.insert(file.name.clone(), file.timestamp);
        self.bytes_downloaded += file.size;
        self.files_downloaded += 1;
        self.current_fraction = 0.0;
        Some(file)
    }

    /// Move the next queued upload into flight
    pub(crate) fn next_upload(&mut self) -> Option<String> {
        self.current_upload = self.upload_queue.pop();
        self.current_upload.clone()
    }

    /// Record the in-flight upload as done with the timestamp the storage assigned
    pub(crate) fn complete_upload(&mut self, timestamp: Timestamp) -> Option<String> {
        let name = self.current_upload.take()?;
        self.local_timestamps.insert(name.clone(), timestamp);
        self.files_uploaded += 1;
        Some(name)
    }

    pub(crate) fn set_download_progress(&mut self, received: u64, total: u64) {
        self.current_fraction = if total == 0 {
            0.0
        } else {
            (received as f64 / total as f64).clamp(0.0, 1.0)
        };
    }

    /// Forget the in-flight download without touching the local file
    pub(crate) fn forget_current_download(&mut self) {
        self.current_download = None;
        self.current_fraction = 0.0;
    }

    /// Drop everything still pending; returns the download that was in flight
    pub(crate) fn abandon(&mut self) -> Option<RemoteFile> {
        self.download_queue.clear();
        self.upload_queue.clear();
        self.current_upload = None;
        self.current_fraction = 0.0;
        self.current_download.take()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn download_queue(&self) -> &[RemoteFile] {
        &self.download_queue
    }

    pub fn upload_queue(&self) -> &[String] {
        &self.upload_queue
    }

    pub fn current_download(&self) -> Option<&RemoteFile> {
        self.current_download.as_ref()
    }

    pub fn current_upload(&self) -> Option<&str> {
        self.current_upload.as_deref()
    }

    pub fn local_timestamps(&self) -> &TimestampMap {
        &self.local_timestamps
    }

    /// Transfers decided at diff time, `None` before diffing
    pub fn total_files_to_handle(&self) -> Option<usize> {
        self.total_files_to_handle
    }

    pub fn bytes_to_download(&self) -> u64 {
        self.bytes_to_download
    }

    /// Bytes downloaded, counting the in-flight file's fractional progress
    pub fn bytes_downloaded(&self) -> u64 {
        let partial = self
            .current_download
            .as_ref()
            .map_or(0, |f| (self.current_fraction * f.size as f64) as u64);
        self.bytes_downloaded + partial
    }

    pub fn files_downloaded(&self) -> usize {
        self.files_downloaded
    }

    pub fn files_uploaded(&self) -> usize {
        self.files_uploaded
    }

    /// Date reported by the listing (or folder creation) response
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// Whole-run progress by file count
    ///
    /// A file counts as handled as soon as it leaves its queue.
    pub fn progress(&self) -> f64 {
        match self.total_files_to_handle {
            None => 0.0,
            Some(0) => 1.0,
            Some(total) => {
                let left = self.download_queue.len() + self.upload_queue.len();
                total.saturating_sub(left) as f64 / total as f64
            }
        }
    }

    /// Download-phase progress
    ///
    /// Byte-based when any bytes are to be downloaded, file-count based
    /// otherwise.
    pub fn download_progress(&self) -> f64 {
        if self.total_files_to_handle.is_none() {
            return 0.0;
        }
        if self.files_to_download == 0 {
            return 1.0;
        }
        if self.bytes_to_download > 0 {
            return (self.bytes_downloaded() as f64 / self.bytes_to_download as f64).min(1.0);
        }
        self.files_downloaded as f64 / self.files_to_download as f64
    }

    pub fn downloading_info(&self) -> DownloadingInfo {
        DownloadingInfo {
            bytes_downloaded: self.bytes_downloaded(),
            bytes_to_download: self.bytes_to_download,
            files_downloaded: self.files_downloaded,
            files_to_download: self.files_to_download,
            in_progress: !self.download_queue.is_empty() || self.current_download.is_some(),
        }
    }

    /// Names still to download: the queue plus the in-flight file
    pub fn files_to_download(&self) -> Vec<String> {
        self.download_queue
            .iter()
            .chain(self.current_download.iter())
            .map(|f| f.name.clone())
            .collect()
    }
}
