//! Cloud storage port (driven/secondary port)
//!
//! This module defines the capability set the sync engine consumes from a
//! remote storage provider: listing a folder, creating a folder, downloading
//! a file by its provider ID and uploading a file.
//!
//! ## Design Notes
//!
//! - Each operation is a two-step affair. The synchronous method *creates*
//!   the request and returns it as a [`PendingRequest`]; the engine then
//!   drives it to completion. An `Err` from the method means the provider
//!   could not even create the request.
//! - A pending request resolves to exactly one of `Ok(response)` or
//!   `Err(ErrorResponse)`. Dropping or aborting it before then delivers
//!   nothing.
//! - Pending requests are `'static` and `Send` so the engine can spawn them
//!   and force-terminate them independently of the provider.
//! - Uses `anyhow::Result` for request creation because those errors are
//!   adapter-specific and don't need domain-level classification.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};

use super::save_store::SaveReader;
use crate::domain::{ErrorResponse, RemoteFile, RemoteId};

/// An issued storage request, resolved by awaiting it
pub type PendingRequest<T> = Pin<Box<dyn Future<Output = Result<T, ErrorResponse>> + Send + 'static>>;

/// Download progress sink: `(bytes_received, bytes_total)`
///
/// `bytes_total` is zero while the size is not yet known.
pub type DownloadProgress = Box<dyn Fn(u64, u64) + Send + Sync + 'static>;

/// Result of listing a remote folder
#[derive(Debug, Clone, Default)]
pub struct ListDirectoryResponse {
    /// Entries of the folder, files and subfolders alike
    pub files: Vec<RemoteFile>,
    /// Server date of the response, if the provider reports one
    pub date: Option<DateTime<Utc>>,
}

/// Result of creating a remote folder
#[derive(Debug, Clone, Default)]
pub struct CreateDirectoryResponse {
    /// Whether the folder exists after the request
    pub created: bool,
    /// Server date of the response, if the provider reports one
    pub date: Option<DateTime<Utc>>,
}

/// Result of uploading a file
#[derive(Debug, Clone)]
pub struct UploadResponse {
    /// The stored remote file; its timestamp becomes the local index entry
    pub file: RemoteFile,
}

/// Content to upload
pub enum UploadSource {
    /// Byte stream opened from the local save store
    Stream(SaveReader),
    /// Absolute path of the local file
    Path(PathBuf),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// Remote storage capability set
///
/// Paths are `/`-separated remote paths. The engine never issues more than
/// one request at a time against a given provider.
pub trait ICloudStorage: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// List the entries of a remote folder
    fn list_directory(&self, path: &str) -> anyhow::Result<PendingRequest<ListDirectoryResponse>>;

    /// Create a remote folder
    fn create_directory(
        &self,
        path: &str,
    ) -> anyhow::Result<PendingRequest<CreateDirectoryResponse>>;

    /// Download a file by ID into `destination`
    ///
    /// Resolves to `Ok(false)` when the transfer ended without producing the
    /// file. Progress is reported through `progress` while in flight.
    fn download_by_id(
        &self,
        id: &RemoteId,
        destination: &Path,
        progress: DownloadProgress,
    ) -> anyhow::Result<PendingRequest<bool>>;

    /// Upload content to the remote path
    fn upload(&self, path: &str, source: UploadSource) -> anyhow::Result<PendingRequest<UploadResponse>>;

    /// Whether [`UploadSource::Stream`] is accepted
    ///
    /// When false, uploads are always issued with [`UploadSource::Path`].
    fn upload_stream_supported(&self) -> bool;
}
