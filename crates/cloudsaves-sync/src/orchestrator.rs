//! Sync orchestrator
//!
//! [`SyncOrchestrator`] drives one [`SyncMachine`] against the storage, index,
//! save store and status ports. It issues the request each transition asks
//! for, feeds completions back into the machine, applies the requested side
//! effects, and reports the terminal outcome.
//!
//! ## Sync Flow
//!
//! 1. **Start**: tear down any previous run, load the timestamp index, list
//!    the remote folder (creating it if it is missing)
//! 2. **Diff**: decide per file, record used space
//! 3. **Downloads**: one file at a time; the index is persisted after each
//! 4. **Uploads**: one file at a time; the index is persisted after each
//! 5. **Completion**: record the last sync date and report the summary
//!
//! ## Concurrency
//!
//! Exactly one storage request is in flight at a time. All state changes
//! happen on the task that calls [`SyncOrchestrator::pump`], so no locking is
//! needed. `start`, `restart` and `cancel` are synchronous: when they return,
//! the previous request can no longer affect the orchestrator and its
//! partially downloaded file is gone. Dropping the orchestrator cancels the
//! run the same way.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloudsaves_core::ports::{
    DownloadProgress, ICloudStorage, ISaveStore, ISyncStatusStore, ITimestampIndex, UploadSource,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::classifier::ErrorClassifier;
use crate::filter::SyncFilter;
use crate::machine::{Command, Effect, Event, Step, SyncMachine, SyncPhase};
use crate::request::{Delivery, Operation, RequestTracker};
use crate::state::{DownloadingInfo, SyncState};
use crate::SyncError;

// ============================================================================
// Outcome and snapshot types
// ============================================================================

/// Summary of a successful sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Date recorded as the last successful sync
    pub last_sync: DateTime<Utc>,
    /// Number of files downloaded from the storage
    pub files_downloaded: usize,
    /// Number of files uploaded to the storage
    pub files_uploaded: usize,
    /// Bytes downloaded
    pub bytes_downloaded: u64,
}

/// Terminal result of a sync run
pub type SyncOutcome = Result<SyncSummary, SyncError>;

/// Point-in-time view of a sync run for UI consumption
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    /// Whole-run progress by file count, 0..=1
    pub progress: f64,
    /// Download-phase progress, 0..=1
    pub download_progress: f64,
    pub downloading: DownloadingInfo,
    /// Names still to download, including the one in flight
    pub files_to_download: Vec<String>,
}

impl SyncSnapshot {
    fn capture(machine: &SyncMachine) -> Self {
        let state = machine.state();
        Self {
            phase: machine.phase().clone(),
            progress: state.progress(),
            download_progress: state.download_progress(),
            downloading: state.downloading_info(),
            files_to_download: state.files_to_download(),
        }
    }
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Async driver of sync runs against one storage
pub struct SyncOrchestrator {
    storage: Arc<dyn ICloudStorage>,
    index: Arc<dyn ITimestampIndex>,
    saves: Arc<dyn ISaveStore>,
    status: Arc<dyn ISyncStatusStore>,
    machine: SyncMachine,
    requests: RequestTracker<Event>,
    outcome: Option<SyncOutcome>,
    snapshots: watch::Sender<SyncSnapshot>,
}

impl SyncOrchestrator {
    /// Create an idle orchestrator syncing the save store with `remote_dir`
    ///
    /// Uses the default [`SyncFilter`] and [`ErrorClassifier`].
    pub fn new(
        storage: Arc<dyn ICloudStorage>,
        index: Arc<dyn ITimestampIndex>,
        saves: Arc<dyn ISaveStore>,
        status: Arc<dyn ISyncStatusStore>,
        remote_dir: impl Into<String>,
    ) -> Self {
        let machine = SyncMachine::new(remote_dir);
        let (snapshots, _) = watch::channel(SyncSnapshot::capture(&machine));
        Self {
            storage,
            index,
            saves,
            status,
            machine,
            requests: RequestTracker::new(),
            outcome: None,
            snapshots,
        }
    }

    /// Replace the file name filter
    #[must_use]
    pub fn with_filter(mut self, filter: SyncFilter) -> Self {
        self.machine.set_filter(filter);
        self
    }

    /// Replace the listing error classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.machine.set_classifier(classifier);
        self
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Start a fresh run, tearing down the current one first
    ///
    /// Must be called from within a Tokio runtime.
    #[tracing::instrument(skip(self), fields(storage = %self.storage.name()))]
    pub fn start(&mut self) {
        self.teardown();
        let step = match self.index.load() {
            Ok(local) => {
                info!(
                    remote_dir = %self.machine.remote_dir(),
                    local_files = local.len(),
                    "Sync run started"
                );
                self.machine.start(local)
            }
            Err(e) => self.machine.abort(SyncError::TimestampIndex(e)),
        };
        self.execute(step);
    }

    /// Same as [`SyncOrchestrator::start`]
    pub fn restart(&mut self) {
        self.start();
    }

    /// Tear down the current run without starting another
    ///
    /// The in-flight request is terminated and its completion will never be
    /// applied; a partially downloaded file is deleted before returning.
    /// Termination does not wait for blocking I/O the request already
    /// started (see [`RequestTracker::finish`]).
    pub fn cancel(&mut self) {
        let terminated = self.requests.finish();
        if !self.machine.phase().is_active() {
            return;
        }
        let step = self.machine.cancel();
        self.apply_effects(step.effects);
        info!(terminated = ?terminated, "Sync run cancelled");
        self.publish();
    }

    /// Drive the current run until it reaches a terminal state
    ///
    /// Returns the run's outcome once, or `None` when no run is in progress
    /// (never started, cancelled, or outcome already returned). Cancel-safe:
    /// dropping the future leaves the run intact, and a later call resumes it.
    pub async fn pump(&mut self) -> Option<SyncOutcome> {
        loop {
            if let Some(outcome) = self.outcome.take() {
                return Some(outcome);
            }
            let event = match self.requests.next().await? {
                Delivery::Progress { received, total } => Event::DownloadProgress { received, total },
                Delivery::Completed(event) => event,
            };
            let step = self.machine.handle(event);
            self.execute(step);
        }
    }

    /// Start a run and drive it to completion
    pub async fn run(&mut self) -> SyncOutcome {
        self.start();
        self.pump().await.unwrap_or(Err(SyncError::Cancelled))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self) -> &SyncPhase {
        self.machine.phase()
    }

    pub fn state(&self) -> &SyncState {
        self.machine.state()
    }

    /// Whether a run is between start and a terminal state
    pub fn is_running(&self) -> bool {
        self.machine.phase().is_active()
    }

    pub fn progress(&self) -> f64 {
        self.machine.state().progress()
    }

    pub fn download_progress(&self) -> f64 {
        self.machine.state().download_progress()
    }

    pub fn downloading_info(&self) -> DownloadingInfo {
        self.machine.state().downloading_info()
    }

    pub fn files_to_download(&self) -> Vec<String> {
        self.machine.state().files_to_download()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot::capture(&self.machine)
    }

    /// Receive a snapshot after every transition
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshots.subscribe()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn teardown(&mut self) {
        self.requests.finish();
        let step = self.machine.cancel();
        self.apply_effects(step.effects);
        self.machine.reset();
        self.outcome = None;
    }

    fn execute(&mut self, step: Step) {
        self.apply_effects(step.effects);

        match step.command {
            Command::ListDirectory { path } => {
                let created = self
                    .storage
                    .list_directory(&path)
                    .map(|rq| async move { Event::Listed(rq.await) });
                self.dispatch(Operation::ListDirectory, created);
            }
            Command::CreateDirectory { path } => {
                let created = self
                    .storage
                    .create_directory(&path)
                    .map(|rq| async move { Event::DirectoryCreated(rq.await) });
                self.dispatch(Operation::CreateDirectory, created);
            }
            Command::Download(file) => {
                let created = self
                    .saves
                    .path_for(&file.name)
                    .and_then(|destination| {
                        let progress: DownloadProgress = Box::new(self.requests.progress_sink());
                        debug!(name = %file.name, id = %file.id, destination = %destination.display(), "Issuing download");
                        self.storage.download_by_id(&file.id, &destination, progress)
                    })
                    .map(|rq| async move { Event::Downloaded(rq.await) });
                self.dispatch(Operation::Download, created);
            }
            Command::Upload(name) => {
                let remote_path = self.machine.remote_path_for(&name);
                debug!(name = %name, remote_path = %remote_path, "Issuing upload");
                let created = self
                    .upload_source(&name)
                    .and_then(|source| self.storage.upload(&remote_path, source))
                    .map(|rq| async move { Event::Uploaded(rq.await) });
                self.dispatch(Operation::Upload, created);
            }
            Command::Succeed(last_sync) => {
                let state = self.machine.state();
                let summary = SyncSummary {
                    last_sync,
                    files_downloaded: state.files_downloaded(),
                    files_uploaded: state.files_uploaded(),
                    bytes_downloaded: state.bytes_downloaded(),
                };
                info!(
                    files_downloaded = summary.files_downloaded,
                    files_uploaded = summary.files_uploaded,
                    bytes_downloaded = summary.bytes_downloaded,
                    last_sync = %summary.last_sync,
                    "Sync run completed"
                );
                self.outcome = Some(Ok(summary));
            }
            Command::Fail(e) => {
                error!(error = %e, "Sync run failed");
                self.outcome = Some(Err(e));
            }
            Command::Wait => {}
        }

        self.publish();
    }

    /// Track a freshly created request, or fail the run if none was created
    fn dispatch<F>(&mut self, operation: Operation, created: anyhow::Result<F>)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        match created {
            Ok(request) => {
                self.requests.issue(operation, request);
            }
            Err(source) => {
                let step = self
                    .machine
                    .abort(SyncError::CouldNotStart { operation, source });
                self.execute(step);
            }
        }
    }

    fn upload_source(&self, name: &str) -> anyhow::Result<UploadSource> {
        if self.storage.upload_stream_supported() {
            Ok(UploadSource::Stream(self.saves.open_raw(name)?))
        } else {
            Ok(UploadSource::Path(self.saves.path_for(name)?))
        }
    }

    fn apply_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistTimestamps => {
                    let timestamps = self.machine.state().local_timestamps();
                    if let Err(e) = self.index.save(timestamps) {
                        warn!(error = %e, entries = timestamps.len(), "Failed to persist timestamp index");
                    }
                }
                Effect::RemoveLocal(name) => match self.saves.remove(&name) {
                    Ok(()) => debug!(name = %name, "Removed partially downloaded file"),
                    Err(e) => warn!(name = %name, error = %e, "Failed to remove partially downloaded file"),
                },
                Effect::RecordUsedSpace(bytes) => {
                    if let Err(e) = self.status.set_used_space(bytes) {
                        warn!(bytes, error = %e, "Failed to record used space");
                    }
                }
                Effect::RecordLastSync(date) => {
                    if let Err(e) = self.status.set_last_sync(date) {
                        warn!(date = %date, error = %e, "Failed to record last sync date");
                    }
                }
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(SyncSnapshot::capture(&self.machine));
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        if self.machine.phase().is_active() {
            self.cancel();
        }
    }
}
