//! Diff policy
//!
//! Compares the remote listing with the local timestamp index and decides,
//! per file, whether to download, upload or leave it alone. Timestamps are
//! the only signal: there is no content hashing.
//!
//! ## Decision table
//!
//! | local index entry        | decision  |
//! |--------------------------|-----------|
//! | absent                   | download  |
//! | equal to remote          | in sync   |
//! | INVALID                  | upload    |
//! | newer than remote        | upload    |
//! | older than remote        | download  |
//!
//! Local entries never seen in the listing are uploaded. A local timestamp
//! can be newer than the remote one when the same saves were synced through
//! a different provider in the meantime.

use std::collections::HashSet;

use cloudsaves_core::domain::{RemoteFile, Timestamp, TimestampMap};
use tracing::debug;

use crate::filter::SyncFilter;

/// What to do with one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fetch the remote copy
    Download,
    /// Push the local copy
    Upload,
    /// Both sides already agree
    InSync,
}

/// Decide for a file that exists remotely
pub fn decide(local: Option<Timestamp>, remote: Timestamp) -> Decision {
    match local {
        None => Decision::Download,
        Some(local) if local == remote => Decision::InSync,
        Some(local) if !local.is_valid() || local > remote => Decision::Upload,
        Some(_) => Decision::Download,
    }
}

/// Outcome of diffing one listing against the local index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Remote files to fetch
    pub downloads: Vec<RemoteFile>,
    /// Local file names to push
    pub uploads: Vec<String>,
    /// Total size of every remote file in the listing, eligible or not
    pub used_space: u64,
}

impl SyncPlan {
    /// Sum of the sizes of the files to download
    pub fn bytes_to_download(&self) -> u64 {
        self.downloads.iter().map(|f| f.size).sum()
    }

    /// Number of transfers the plan calls for
    pub fn len(&self) -> usize {
        self.downloads.len() + self.uploads.len()
    }

    /// True when nothing needs transferring
    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty() && self.uploads.is_empty()
    }
}

/// Build the transfer plan for `remote` against `local`
///
/// Directories are skipped. Every other entry counts towards `used_space`,
/// since it occupies the provider, but names rejected by `filter` are never
/// queued.
pub fn plan(remote: &[RemoteFile], local: &TimestampMap, filter: &SyncFilter) -> SyncPlan {
    let mut result = SyncPlan::default();
    let mut seen_remotely: HashSet<&str> = HashSet::new();

    for file in remote {
        if file.is_directory {
            continue;
        }
        result.used_space += file.size;
        if !filter.is_eligible(&file.name) {
            continue;
        }
        if !seen_remotely.insert(file.name.as_str()) {
            debug!(name = %file.name, "Duplicate listing entry ignored");
            continue;
        }

        let local_ts = local.get(&file.name).copied();
        match decide(local_ts, file.timestamp) {
            Decision::Download => {
                match local_ts {
                    None => debug!(name = %file.name, "Download: not present locally"),
                    Some(ts) => debug!(
                        name = %file.name,
                        local = %ts,
                        remote = %file.timestamp,
                        older_by = file.timestamp.as_secs() - ts.as_secs(),
                        "Download: remote is newer"
                    ),
                }
                result.downloads.push(file.clone());
            }
            Decision::Upload => {
                match local_ts {
                    Some(ts) if !ts.is_valid() => {
                        debug!(name = %file.name, "Upload: local timestamp is invalid")
                    }
                    Some(ts) => debug!(
                        name = %file.name,
                        local = %ts,
                        remote = %file.timestamp,
                        newer_by = ts.as_secs() - file.timestamp.as_secs(),
                        "Upload: local is newer"
                    ),
                    None => {}
                }
                result.uploads.push(file.name.clone());
            }
            Decision::InSync => {}
        }
    }

    for name in local.keys() {
        if seen_remotely.contains(name.as_str()) || !filter.is_eligible(name) {
            continue;
        }
        debug!(name = %name, "Upload: not present remotely");
        result.uploads.push(name.clone());
    }

    debug!(
        downloads = result.downloads.len(),
        uploads = result.uploads.len(),
        bytes_to_download = result.bytes_to_download(),
        "Sync plan computed"
    );
    result
}
