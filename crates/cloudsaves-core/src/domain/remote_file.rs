//! Remote file descriptor
//!
//! A [`RemoteFile`] is what the storage collaborator reports for each entry
//! of a directory listing, and what it returns after an upload. It is
//! immutable once observed.

use serde::{Deserialize, Serialize};

use super::newtypes::{RemoteId, Timestamp};

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-specific identifier used for download-by-id
    pub id: RemoteId,
    /// File name within the listed directory
    pub name: String,
    /// Size in bytes (zero for directories)
    pub size: u64,
    /// Remote modification time
    pub timestamp: Timestamp,
    /// Whether the entry is a folder
    pub is_directory: bool,
}

impl RemoteFile {
    /// Describe a regular file
    #[must_use]
    pub fn file(id: RemoteId, name: impl Into<String>, size: u64, timestamp: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            timestamp,
            is_directory: false,
        }
    }

    /// Describe a folder
    #[must_use]
    pub fn directory(id: RemoteId, name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            size: 0,
            timestamp,
            is_directory: true,
        }
    }
}
