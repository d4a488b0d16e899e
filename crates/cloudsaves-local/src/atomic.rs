use std::path::{Path, PathBuf};

use tracing::debug;

/// Hidden sibling path used while a file is being replaced
pub(crate) fn temp_path(target: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".tmp");
    target.with_file_name(name)
}

/// Replace `target` with `data` via write-to-temp + rename
pub(crate) fn write_atomically(target: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(target);
    debug!(?tmp_path, bytes = data.len(), "writing to temporary file");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, target)
}
