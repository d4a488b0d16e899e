//! CloudSaves Sync - Save synchronization engine
//!
//! Provides:
//! - Timestamp-based last-writer-wins reconciliation of a local save
//!   directory against a remote folder
//! - Sequential download-then-upload transfer pipeline
//! - Self-healing when the remote folder does not exist yet
//! - Cancellation that never leaves a partially downloaded file behind
//!
//! ## Modules
//!
//! - [`request`] - Single in-flight request tracking with generation-tagged completions
//! - [`classifier`] - Tells a missing remote folder apart from genuine failures
//! - [`filter`] - Which file names may be synced at all
//! - [`policy`] - Per-file download/upload/skip decisions
//! - [`state`] - Working set of one sync run and its progress measures
//! - [`machine`] - Pure transition function of a sync run
//! - [`orchestrator`] - Async driver wiring the machine to the storage ports

pub mod classifier;
pub mod filter;
pub mod machine;
pub mod orchestrator;
pub mod policy;
pub mod request;
pub mod state;

use cloudsaves_core::domain::ErrorResponse;
use thiserror::Error;

pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncSnapshot, SyncSummary};
pub use request::Operation;

/// Terminal failure of a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// A storage request failed and the failure is not recoverable
    #[error("Remote request failed: {0}")]
    Remote(#[from] ErrorResponse),

    /// The storage provider refused to create a request
    #[error("Storage could not create a request to {operation}: {source}")]
    CouldNotStart {
        /// The operation that was about to be issued
        operation: Operation,
        /// Why the provider refused
        source: anyhow::Error,
    },

    /// The remote folder was missing and could not be created
    #[error("Failed to create remote directory: {0}")]
    DirectoryNotCreated(String),

    /// A download finished without producing the file
    #[error("Failed to download a file: {0}")]
    DownloadFailed(String),

    /// The local timestamp index could not be read at run start
    #[error("Failed to load local timestamp index: {0}")]
    TimestampIndex(#[source] anyhow::Error),

    /// The run was restarted or destroyed before reaching a terminal state
    #[error("Sync run cancelled")]
    Cancelled,
}
