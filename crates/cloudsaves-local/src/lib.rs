//! CloudSaves Local - Filesystem adapters
//!
//! Driven (secondary) adapters for the ports defined in `cloudsaves-core`:
//!
//! - [`FsSaveStore`] - the local save directory (`ISaveStore`)
//! - [`FileTimestampIndex`] - the `timestamps` text file (`ITimestampIndex`)
//! - [`YamlSyncStatusStore`] - last sync date and used space (`ISyncStatusStore`)
//! - [`FolderStorage`] - a local directory standing in for the cloud
//!   (`ICloudStorage`)
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudsaves_local::{FileTimestampIndex, FolderStorage, FsSaveStore, YamlSyncStatusStore};
//!
//! # fn example() -> anyhow::Result<()> {
//! let saves = FsSaveStore::open("/home/user/.local/share/cloudsaves/saves")?;
//! let index = FileTimestampIndex::in_dir(saves.dir());
//! let status = YamlSyncStatusStore::open("/home/user/.local/share/cloudsaves/status.yaml")?;
//! let storage = FolderStorage::new("/home/user/CloudSaves");
//! # let _ = (Arc::new(saves), Arc::new(index), Arc::new(status), Arc::new(storage));
//! # Ok(())
//! # }
//! ```

mod atomic;
pub mod folder;
pub mod save_store;
pub mod status;
pub mod timestamp_index;

pub use folder::FolderStorage;
pub use save_store::FsSaveStore;
pub use status::{SyncStatus, YamlSyncStatusStore};
pub use timestamp_index::FileTimestampIndex;
