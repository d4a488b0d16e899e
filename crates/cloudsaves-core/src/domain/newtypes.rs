//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the values the sync
//! engine compares and passes around: modification timestamps and
//! provider-specific file identifiers. It also holds the check that keeps a
//! save file name inside the save directory.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Timestamp
// ============================================================================

/// Modification time of a save file in whole seconds since the Unix epoch
///
/// Timestamps are 32-bit to match the on-disk index format. The maximum
/// value is reserved as [`Timestamp::INVALID`], which marks a local file whose
/// real modification time is unknown (for example, a save written by the
/// game before the index existed). Such a file is always considered newer
/// than its remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u32);

impl Timestamp {
    /// Sentinel for "unknown local modification time"
    pub const INVALID: Timestamp = Timestamp(u32::MAX);

    /// Create a timestamp from seconds since the epoch
    #[must_use]
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Convert a UTC date, clamping out-of-range values into the valid range
    #[must_use]
    pub fn from_datetime(date: DateTime<Utc>) -> Self {
        let secs = date.timestamp().clamp(0, i64::from(u32::MAX - 1));
        Self(secs as u32)
    }

    /// Seconds since the epoch
    #[must_use]
    pub const fn as_secs(&self) -> u32 {
        self.0
    }

    /// Returns false for the [`Timestamp::INVALID`] sentinel
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Convert to a UTC date, `None` for the sentinel
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.is_valid() {
            return None;
        }
        Utc.timestamp_opt(i64::from(self.0), 0).single()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|e| DomainError::InvalidTimestamp(format!("{s}: {e}")))
    }
}

impl From<u32> for Timestamp {
    fn from(secs: u32) -> Self {
        Self(secs)
    }
}

/// File name to timestamp-at-last-sync mapping
///
/// Ordered so that the persisted form is stable between writes.
pub type TimestampMap = BTreeMap<String, Timestamp>;

// ============================================================================
// RemoteId
// ============================================================================

/// Provider-specific identifier of a remote file
///
/// The format is opaque to the engine: OneDrive item IDs, Google Drive file
/// IDs and Dropbox `id:` strings are all accepted. Only emptiness is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

// ============================================================================
// Save file names
// ============================================================================

/// Check that `name` is a single path component
///
/// Save files live directly in the save directory, so a name must not be
/// empty, contain a separator or NUL, or be `.` or `..`. Names come from
/// remote listings as well as from the local directory.
///
/// # Errors
/// Returns [`DomainError::InvalidFileName`] describing the first problem found
pub fn check_save_name(name: &str) -> Result<(), DomainError> {
    let problem = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name refers to a directory"
    } else if name.contains(['/', '\\']) {
        "name contains a path separator"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(DomainError::InvalidFileName(format!("{name:?}: {problem}")))
}
