//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICloudStorage`] - Remote storage operations (list, create folder, download, upload)
//! - [`ITimestampIndex`] - Persistent file name to last-synced timestamp map
//! - [`ISaveStore`] - Local save directory access
//! - [`ISyncStatusStore`] - Last successful sync date and used space

pub mod cloud_storage;
pub mod save_store;
pub mod sync_status;
pub mod timestamp_index;

pub use cloud_storage::{
    CreateDirectoryResponse, DownloadProgress, ICloudStorage, ListDirectoryResponse,
    PendingRequest, UploadResponse, UploadSource,
};
pub use save_store::{ISaveStore, SaveReader};
pub use sync_status::ISyncStatusStore;
pub use timestamp_index::{ITimestampIndex, TIMESTAMPS_FILENAME};
