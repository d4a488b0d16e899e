//! Folder-backed storage provider
//!
//! Implements [`ICloudStorage`] over a local directory, so the sync engine
//! can run without a network provider (a mounted share, a directory synced by
//! another tool, or a test fixture).
//!
//! ## Design Notes
//!
//! - **Remote ids** are paths relative to the storage root, `/`-separated.
//!   Ids that climb out of the root are refused.
//! - **Missing folders** are reported the way OneDrive reports them: status
//!   404 with an `itemNotFound` / `Item does not exist` body, which the error
//!   classifier treats as recoverable.
//! - **Timestamps** are file modification times in whole seconds.
//! - **Transfers** in both directions are written to a hidden `.part`
//!   sibling and renamed into place once complete, so neither a listing nor
//!   the save directory ever shows a half-written file. A transfer dropped
//!   midway removes its part file; a blocking write the runtime had already
//!   started can only land in that hidden file.

use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::bail;
use chrono::{DateTime, Utc};
use cloudsaves_core::domain::{ErrorResponse, RemoteFile, RemoteId, Timestamp};
use cloudsaves_core::ports::{
    CreateDirectoryResponse, DownloadProgress, ICloudStorage, ListDirectoryResponse,
    PendingRequest, UploadResponse, UploadSource,
};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, Instrument};

/// Error body for a path that does not exist
const ITEM_NOT_FOUND: &str =
    r#"{"error": {"code": "itemNotFound", "message": "Item does not exist"}}"#;

/// Download chunk size; progress is reported after each chunk
const CHUNK_SIZE: usize = 64 * 1024;

/// A local directory standing in for cloud storage
#[derive(Debug, Clone)]
pub struct FolderStorage {
    root: PathBuf,
    stream_uploads: bool,
}

impl FolderStorage {
    /// Storage rooted at `root`; uploads are streamed by default
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stream_uploads: true,
        }
    }

    /// Whether uploads take a byte stream or a local path
    #[must_use]
    pub fn with_stream_uploads(mut self, enabled: bool) -> Self {
        self.stream_uploads = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a remote path or id onto the root
    fn resolve(&self, remote: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(remote.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!("Remote path escapes the storage root: {remote}");
        }
        Ok(self.root.join(relative))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn io_failure(e: std::io::Error) -> ErrorResponse {
    if e.kind() == ErrorKind::NotFound {
        ErrorResponse::failed(ITEM_NOT_FOUND, 404)
    } else {
        ErrorResponse::message(e.to_string())
    }
}

fn modified_timestamp(metadata: &Metadata) -> Timestamp {
    metadata
        .modified()
        .map(|mtime| Timestamp::from_datetime(DateTime::<Utc>::from(mtime)))
        .unwrap_or(Timestamp::INVALID)
}

fn remote_id(root: &Path, path: &Path) -> Result<RemoteId, ErrorResponse> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| ErrorResponse::message(e.to_string()))?;
    let id = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    RemoteId::new(id).map_err(|e| ErrorResponse::message(e.to_string()))
}

fn describe(root: &Path, path: &Path, metadata: &Metadata) -> Result<RemoteFile, ErrorResponse> {
    let id = remote_id(root, path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let timestamp = modified_timestamp(metadata);
    Ok(if metadata.is_dir() {
        RemoteFile::directory(id, name, timestamp)
    } else {
        RemoteFile::file(id, name, metadata.len(), timestamp)
    })
}

/// Hidden sibling a file is written to before it is renamed into place
///
/// Removed on drop unless committed.
struct PartFile {
    part: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartFile {
    fn new(target: &Path) -> Self {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            part: target.with_file_name(format!(".{file_name}.part")),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.part
    }

    async fn commit(mut self) -> std::io::Result<()> {
        tokio::fs::rename(&self.part, &self.target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.part);
        }
    }
}

/// Copy `source` into `target` through a hidden sibling, then rename
async fn store(target: &Path, source: UploadSource) -> std::io::Result<()> {
    let part = PartFile::new(target);
    let mut reader: Box<dyn AsyncRead + Send + Unpin> = match source {
        UploadSource::Stream(reader) => reader,
        UploadSource::Path(local) => Box::new(File::open(&local).await?),
    };
    let mut output = File::create(part.path()).await?;
    let bytes = tokio::io::copy(&mut reader, &mut output).await?;
    output.flush().await?;
    drop(output);
    debug!(bytes, "upload content written");
    part.commit().await
}

// ============================================================================
// ICloudStorage implementation
// ============================================================================

impl ICloudStorage for FolderStorage {
    fn name(&self) -> &str {
        "folder"
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn list_directory(&self, path: &str) -> anyhow::Result<PendingRequest<ListDirectoryResponse>> {
        let dir = self.resolve(path)?;
        let root = self.root.clone();

        Ok(Box::pin(
            async move {
                let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_failure)?;
                let mut files = Vec::new();
                while let Some(entry) = entries.next_entry().await.map_err(io_failure)? {
                    let metadata = entry.metadata().await.map_err(io_failure)?;
                    files.push(describe(&root, &entry.path(), &metadata)?);
                }
                files.sort_by(|a, b| a.name.cmp(&b.name));
                debug!(entries = files.len(), "listing complete");
                Ok(ListDirectoryResponse {
                    files,
                    date: Some(Utc::now()),
                })
            }
            .in_current_span(),
        ))
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn create_directory(&self, path: &str) -> anyhow::Result<PendingRequest<CreateDirectoryResponse>> {
        let dir = self.resolve(path)?;

        Ok(Box::pin(
            async move {
                tokio::fs::create_dir_all(&dir).await.map_err(io_failure)?;
                debug!("directory created");
                Ok(CreateDirectoryResponse {
                    created: true,
                    date: Some(Utc::now()),
                })
            }
            .in_current_span(),
        ))
    }

    #[instrument(skip(self, progress), fields(root = %self.root.display(), destination = %destination.display()))]
    fn download_by_id(
        &self,
        id: &RemoteId,
        destination: &Path,
        progress: DownloadProgress,
    ) -> anyhow::Result<PendingRequest<bool>> {
        let source = self.resolve(id.as_str())?;
        let destination = destination.to_path_buf();

        Ok(Box::pin(
            async move {
                let mut input = File::open(&source).await.map_err(io_failure)?;
                let total = input.metadata().await.map_err(io_failure)?.len();
                let part = PartFile::new(&destination);
                let mut output = File::create(part.path()).await.map_err(io_failure)?;

                let mut buf = vec![0u8; CHUNK_SIZE];
                let mut received = 0u64;
                progress(0, total);
                loop {
                    let n = input.read(&mut buf).await.map_err(io_failure)?;
                    if n == 0 {
                        break;
                    }
                    output.write_all(&buf[..n]).await.map_err(io_failure)?;
                    received += n as u64;
                    progress(received, total);
                }
                output.flush().await.map_err(io_failure)?;
                drop(output);

                debug!(bytes = received, "download complete");
                if received != total {
                    return Ok(false);
                }
                part.commit().await.map_err(io_failure)?;
                Ok(true)
            }
            .in_current_span(),
        ))
    }

    #[instrument(skip(self, source), fields(root = %self.root.display()))]
    fn upload(&self, path: &str, source: UploadSource) -> anyhow::Result<PendingRequest<UploadResponse>> {
        let target = self.resolve(path)?;
        let root = self.root.clone();

        Ok(Box::pin(
            async move {
                store(&target, source).await.map_err(io_failure)?;
                let metadata = tokio::fs::metadata(&target).await.map_err(io_failure)?;
                let file = describe(&root, &target, &metadata)?;
                debug!(size = file.size, timestamp = %file.timestamp, "upload complete");
                Ok(UploadResponse { file })
            }
            .in_current_span(),
        ))
    }

    fn upload_stream_supported(&self) -> bool {
        self.stream_uploads
    }
}
