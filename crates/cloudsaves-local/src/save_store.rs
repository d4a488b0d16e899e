//! Filesystem save store
//!
//! Implements [`ISaveStore`] over a plain directory. Save files live
//! directly in the directory, addressed by file name; names with path
//! separators or `..` are refused before touching the filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cloudsaves_core::domain::check_save_name;
use cloudsaves_core::ports::{ISaveStore, SaveReader};
use tracing::{debug, instrument};

/// Local save directory on disk
#[derive(Debug, Clone)]
pub struct FsSaveStore {
    dir: PathBuf,
}

impl FsSaveStore {
    /// Use `dir` as the save directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create save directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ISaveStore for FsSaveStore {
    fn path_for(&self, name: &str) -> anyhow::Result<PathBuf> {
        check_save_name(name)?;
        Ok(self.dir.join(name))
    }

    #[instrument(skip(self))]
    fn remove(&self, name: &str) -> anyhow::Result<()> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed save file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    #[instrument(skip(self))]
    fn open_raw(&self, name: &str) -> anyhow::Result<SaveReader> {
        let path = self.path_for(name)?;
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Box::new(tokio::fs::File::from_std(file)))
    }
}
