//! Timestamp index file
//!
//! The index lives in the save directory as a text file named `timestamps`,
//! one entry per line:
//!
//! ```text
//! slot1.sav 1714557600
//! slot2.sav 4294967295
//! ```
//!
//! The name is everything before the last space, so names may contain
//! spaces. A line whose timestamp is empty, zero or unparsable ends parsing.
//! `4294967295` is the invalid-timestamp sentinel.
//!
//! Loading also scans the save directory: a save file the index has no entry
//! for (a save the game wrote since the last sync) is reported with the
//! invalid timestamp, so it is uploaded rather than overwritten. Hidden files
//! and the index itself are not saves.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cloudsaves_core::domain::{check_save_name, Timestamp, TimestampMap};
use cloudsaves_core::ports::{ITimestampIndex, TIMESTAMPS_FILENAME};
use tracing::{debug, instrument};

use crate::atomic::write_atomically;

/// `timestamps` file backed index
#[derive(Debug, Clone)]
pub struct FileTimestampIndex {
    path: PathBuf,
}

impl FileTimestampIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Index stored in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TIMESTAMPS_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the index and the saves it describes
    fn saves_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

/// Names of the save files in `dir`
fn list_saves(dir: &Path) -> std::io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            debug!(name = ?entry.file_name(), "skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with('.') || name == TIMESTAMPS_FILENAME || check_save_name(&name).is_err() {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Parse the text form of the index
pub fn parse(text: &str) -> TimestampMap {
    let mut map = TimestampMap::new();
    for line in text.lines() {
        let (name, secs) = line.rsplit_once(' ').unwrap_or((line, ""));
        let secs = secs.trim().parse::<u32>().unwrap_or(0);
        if secs == 0 {
            break;
        }
        map.insert(name.to_string(), Timestamp::from_secs(secs));
    }
    map
}

/// Render the index in its text form
pub fn render(map: &TimestampMap) -> String {
    map.iter()
        .map(|(name, timestamp)| format!("{name} {}\n", timestamp.as_secs()))
        .collect()
}

impl ITimestampIndex for FileTimestampIndex {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> anyhow::Result<TimestampMap> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no timestamp index yet");
                String::new()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let mut map = parse(&text);
        let indexed = map.len();

        let dir = self.saves_dir();
        let saves = list_saves(dir)
            .with_context(|| format!("Failed to scan save directory {}", dir.display()))?;
        for name in saves {
            map.entry(name).or_insert_with_key(|name| {
                debug!(name = %name, "save file missing from the index");
                Timestamp::INVALID
            });
        }

        debug!(indexed, unindexed = map.len() - indexed, "timestamp index loaded");
        Ok(map)
    }

    #[instrument(skip(self, timestamps), fields(path = %self.path.display(), entries = timestamps.len()))]
    fn save(&self, timestamps: &TimestampMap) -> anyhow::Result<()> {
        write_atomically(&self.path, render(timestamps).as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
