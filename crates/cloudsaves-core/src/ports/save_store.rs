//! Local save store port
//!
//! Access to the local save directory. The engine only needs to derive the
//! path a download is written to, open a file for a streamed upload, and
//! delete a partially downloaded file.
//!
//! Methods are synchronous so that cleanup can run from `Drop` and from
//! cancellation paths that must finish before returning to the caller.

use std::path::PathBuf;

use tokio::io::AsyncRead;

/// Readable byte stream over a local save file
pub type SaveReader = Box<dyn AsyncRead + Send + Unpin>;

/// Local save directory
pub trait ISaveStore: Send + Sync {
    /// Absolute path of the save file called `name`
    ///
    /// Fails for a name that would not stay inside the save directory.
    fn path_for(&self, name: &str) -> anyhow::Result<PathBuf>;

    /// Delete the save file called `name`
    ///
    /// Deleting a file that does not exist is not an error.
    fn remove(&self, name: &str) -> anyhow::Result<()>;

    /// Open the save file called `name` for streaming
    fn open_raw(&self, name: &str) -> anyhow::Result<SaveReader>;
}
