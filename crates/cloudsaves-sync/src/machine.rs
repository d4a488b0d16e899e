//! Sync run state machine
//!
//! [`SyncMachine`] is the transition function of a sync run. It takes one
//! [`Event`] (the result of the request that was in flight) and returns a
//! [`Step`]: side effects to apply locally, and the next request to issue or
//! the terminal outcome. It performs no I/O itself, which keeps the policy
//! testable without any storage behind it.
//!
//! ## Phases
//!
//! ```text
//! Idle -> ListingDirectory -+-> (diff) -> Downloading* -> Uploading* -> Succeeded
//!                           |
//!                           +-> CreatingDirectory -> (diff with empty listing)
//!
//! any active phase -> Failed | Cancelled
//! ```
//!
//! Diffing happens inside the transition that receives the listing, so it
//! never shows up as a phase of its own.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use cloudsaves_core::domain::{ErrorResponse, RemoteFile, TimestampMap};
use cloudsaves_core::ports::{CreateDirectoryResponse, ListDirectoryResponse, UploadResponse};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::ErrorClassifier;
use crate::filter::SyncFilter;
use crate::policy;
use crate::state::SyncState;
use crate::SyncError;

// ============================================================================
// Phase, events, steps
// ============================================================================

/// Where a sync run currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "reason", rename_all = "snake_case")]
pub enum SyncPhase {
    /// No run started yet
    Idle,
    /// Waiting for the remote folder listing
    ListingDirectory,
    /// Waiting for the missing remote folder to be created
    CreatingDirectory,
    /// Draining the download queue
    Downloading,
    /// Draining the upload queue
    Uploading,
    /// Run finished successfully
    Succeeded,
    /// Run aborted with the given error message
    Failed(String),
    /// Run torn down by restart or destruction
    Cancelled,
}

impl SyncPhase {
    /// Whether a request of this run may still be in flight
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::ListingDirectory | Self::CreatingDirectory | Self::Downloading | Self::Uploading
        )
    }

    /// Whether the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::ListingDirectory => f.write_str("listing remote directory"),
            Self::CreatingDirectory => f.write_str("creating remote directory"),
            Self::Downloading => f.write_str("downloading"),
            Self::Uploading => f.write_str("uploading"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result delivered by the request that was in flight
#[derive(Debug)]
pub enum Event {
    Listed(Result<ListDirectoryResponse, ErrorResponse>),
    DirectoryCreated(Result<CreateDirectoryResponse, ErrorResponse>),
    Downloaded(Result<bool, ErrorResponse>),
    Uploaded(Result<UploadResponse, ErrorResponse>),
    /// Byte progress of the in-flight download
    DownloadProgress { received: u64, total: u64 },
}

/// Local side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write the machine's current timestamp map to the index
    PersistTimestamps,
    /// Delete a (partially downloaded) local save file
    RemoveLocal(String),
    /// Report the remote used space
    RecordUsedSpace(u64),
    /// Report the date of this successful run
    RecordLastSync(DateTime<Utc>),
}

/// What the driver must do next
#[derive(Debug)]
pub enum Command {
    ListDirectory { path: String },
    CreateDirectory { path: String },
    Download(RemoteFile),
    /// Upload the local save file with this name
    Upload(String),
    Succeed(DateTime<Utc>),
    Fail(SyncError),
    /// Nothing to issue; keep waiting for the in-flight request
    Wait,
}

/// Output of one transition
#[derive(Debug)]
pub struct Step {
    /// Effects to apply, in order, before acting on `command`
    pub effects: Vec<Effect>,
    pub command: Command,
}

impl Step {
    fn wait() -> Self {
        Self {
            effects: Vec::new(),
            command: Command::Wait,
        }
    }

    fn command(command: Command) -> Self {
        Self {
            effects: Vec::new(),
            command,
        }
    }
}

// ============================================================================
// SyncMachine
// ============================================================================

/// Transition function of a sync run
pub struct SyncMachine {
    remote_dir: String,
    filter: SyncFilter,
    classifier: ErrorClassifier,
    phase: SyncPhase,
    state: SyncState,
}

impl SyncMachine {
    /// Machine syncing against `remote_dir`; a trailing `/` is dropped
    pub fn new(remote_dir: impl Into<String>) -> Self {
        let mut remote_dir = remote_dir.into();
        while remote_dir.len() > 1 && remote_dir.ends_with('/') {
            remote_dir.pop();
        }
        Self {
            remote_dir,
            filter: SyncFilter::default(),
            classifier: ErrorClassifier::default(),
            phase: SyncPhase::Idle,
            state: SyncState::default(),
        }
    }

    pub fn set_filter(&mut self, filter: SyncFilter) {
        self.filter = filter;
    }

    pub fn set_classifier(&mut self, classifier: ErrorClassifier) {
        self.classifier = classifier;
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    /// Remote path a local save file is uploaded to
    pub fn remote_path_for(&self, name: &str) -> String {
        if self.remote_dir.ends_with('/') {
            format!("{}{name}", self.remote_dir)
        } else {
            format!("{}/{name}", self.remote_dir)
        }
    }

    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Begin a fresh run from the loaded local index
    pub fn start(&mut self, local_timestamps: TimestampMap) -> Step {
        self.state = SyncState::new(local_timestamps);
        self.phase = SyncPhase::ListingDirectory;
        debug!(remote_dir = %self.remote_dir, "Listing remote directory");
        Step::command(Command::ListDirectory {
            path: self.remote_dir.clone(),
        })
    }

    /// Forget the previous run entirely
    pub fn reset(&mut self) {
        self.state = SyncState::default();
        self.phase = SyncPhase::Idle;
    }

    /// Apply the result of the in-flight request
    pub fn handle(&mut self, event: Event) -> Step {
        let phase = self.phase.clone();
        match (phase, event) {
            (SyncPhase::ListingDirectory, Event::Listed(Ok(response))) => {
                self.diff(response.files, response.date)
            }
            (SyncPhase::ListingDirectory, Event::Listed(Err(error))) => self.listing_failed(error),
            (SyncPhase::CreatingDirectory, Event::DirectoryCreated(Ok(response))) => {
                if !response.created {
                    return self.fail(SyncError::DirectoryNotCreated(self.remote_dir.clone()));
                }
                info!(remote_dir = %self.remote_dir, "Remote directory created");
                self.diff(Vec::new(), response.date)
            }
            (SyncPhase::CreatingDirectory, Event::DirectoryCreated(Err(error))) => {
                self.fail(SyncError::Remote(error))
            }
            (SyncPhase::Downloading, Event::DownloadProgress { received, total }) => {
                self.state.set_download_progress(received, total);
                Step::wait()
            }
            (SyncPhase::Downloading, Event::Downloaded(Ok(true))) => {
                if let Some(file) = self.state.complete_download() {
                    debug!(name = %file.name, bytes = file.size, "Download complete");
                }
                self.next_download(vec![Effect::PersistTimestamps])
            }
            (SyncPhase::Downloading, Event::Downloaded(Ok(false))) => {
                let name = self
                    .state
                    .current_download()
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                self.fail(SyncError::DownloadFailed(name))
            }
            (SyncPhase::Downloading, Event::Downloaded(Err(error))) => {
                self.fail(SyncError::Remote(error))
            }
            (SyncPhase::Uploading, Event::Uploaded(Ok(response))) => {
                if let Some(name) = self.state.complete_upload(response.file.timestamp) {
                    debug!(name = %name, timestamp = %response.file.timestamp, "Upload complete");
                }
                self.next_upload(vec![Effect::PersistTimestamps])
            }
            (SyncPhase::Uploading, Event::Uploaded(Err(error))) => {
                self.fail(SyncError::Remote(error))
            }
            (phase, event) => {
                warn!(%phase, ?event, "Ignoring event not expected in this phase");
                Step::wait()
            }
        }
    }

    /// Fail the run because the next request could not be issued
    ///
    /// The local copy of a file whose download never started is left alone.
    pub fn abort(&mut self, error: SyncError) -> Step {
        self.state.forget_current_download();
        self.fail(error)
    }

    /// Tear the run down; deletes the file being downloaded, if any
    pub fn cancel(&mut self) -> Step {
        let mut effects = Vec::new();
        if self.phase.is_active() {
            if let Some(partial) = self.state.abandon() {
                effects.push(Effect::RemoveLocal(partial.name));
            }
            self.phase = SyncPhase::Cancelled;
        }
        Step {
            effects,
            command: Command::Wait,
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn listing_failed(&mut self, error: ErrorResponse) -> Step {
        if self.classifier.is_irrecoverable(&error) {
            return self.fail(SyncError::Remote(error));
        }
        info!(
            remote_dir = %self.remote_dir,
            status = ?error.http_status,
            "Remote directory missing, creating it"
        );
        self.phase = SyncPhase::CreatingDirectory;
        Step::command(Command::CreateDirectory {
            path: self.remote_dir.clone(),
        })
    }

    fn diff(&mut self, files: Vec<RemoteFile>, date: Option<DateTime<Utc>>) -> Step {
        self.state.set_date(date);
        let plan = policy::plan(&files, self.state.local_timestamps(), &self.filter);
        let effects = vec![Effect::RecordUsedSpace(plan.used_space)];

        info!(
            remote_files = files.len(),
            downloads = plan.downloads.len(),
            uploads = plan.uploads.len(),
            bytes_to_download = plan.bytes_to_download(),
            "Diff complete"
        );
        self.state.apply_plan(plan);
        self.next_download(effects)
    }

    fn next_download(&mut self, effects: Vec<Effect>) -> Step {
        match self.state.next_download() {
            Some(file) => {
                self.phase = SyncPhase::Downloading;
                debug!(
                    name = %file.name,
                    progress = self.state.progress(),
                    "Downloading"
                );
                Step {
                    effects,
                    command: Command::Download(file),
                }
            }
            None => self.next_upload(effects),
        }
    }

    fn next_upload(&mut self, mut effects: Vec<Effect>) -> Step {
        match self.state.next_upload() {
            Some(name) => {
                self.phase = SyncPhase::Uploading;
                debug!(name = %name, progress = self.state.progress(), "Uploading");
                Step {
                    effects,
                    command: Command::Upload(name),
                }
            }
            None => {
                let date = self.state.date().unwrap_or_else(Utc::now);
                self.phase = SyncPhase::Succeeded;
                effects.push(Effect::RecordLastSync(date));
                Step {
                    effects,
                    command: Command::Succeed(date),
                }
            }
        }
    }

    fn fail(&mut self, error: SyncError) -> Step {
        let mut effects = Vec::new();
        if let Some(partial) = self.state.abandon() {
            effects.push(Effect::RemoveLocal(partial.name));
        }
        self.phase = SyncPhase::Failed(error.to_string());
        Step {
            effects,
            command: Command::Fail(error),
        }
    }
}
