//! Local timestamp index port
//!
//! The index maps each save file name to the timestamp it had when it was
//! last synced. It is the engine's only record of "what was last synced and
//! when": read once at the start of a run and rewritten after every
//! successful transfer.

use crate::domain::TimestampMap;

/// Reserved name of the index file inside the save directory
///
/// Never synced in either direction.
pub const TIMESTAMPS_FILENAME: &str = "timestamps";

/// Persistent file name to timestamp map
pub trait ITimestampIndex: Send + Sync {
    /// Read the whole index; a missing index is an empty map
    ///
    /// Local saves the index has no entry for are included with
    /// [`Timestamp::INVALID`](crate::domain::Timestamp::INVALID), which makes
    /// the local copy authoritative.
    fn load(&self) -> anyhow::Result<TimestampMap>;

    /// Replace the persisted index with `timestamps`
    fn save(&self, timestamps: &TimestampMap) -> anyhow::Result<()>;
}
