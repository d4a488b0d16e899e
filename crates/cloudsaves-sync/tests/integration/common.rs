//! Shared test doubles for the sync orchestrator
//!
//! - [`ScriptedStorage`] answers each request kind from a queue of scripted
//!   replies and records every call it receives.
//! - [`MemoryIndex`] and [`MemoryStatus`] keep their data in memory.
//! - [`TempSaves`] is a real save directory under a temp dir, so downloads
//!   and partial-file cleanup can be observed on disk.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use tokio::io::AsyncReadExt;

use cloudsaves_core::domain::{ErrorResponse, RemoteFile, RemoteId, Timestamp, TimestampMap};
use cloudsaves_core::ports::{
    CreateDirectoryResponse, DownloadProgress, ICloudStorage, ISaveStore, ISyncStatusStore,
    ITimestampIndex, ListDirectoryResponse, PendingRequest, SaveReader, UploadResponse,
    UploadSource,
};
use cloudsaves_sync::SyncOrchestrator;

pub const REMOTE_DIR: &str = "/saves/";

/// How a scripted request behaves
pub enum Reply<T> {
    /// Resolve right away with this result
    Now(Result<T, ErrorResponse>),
    /// Never resolve
    Never,
    /// Refuse to create the request
    Refuse,
}

pub fn listing_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

pub fn remote(name: &str, secs: u32, size: u64) -> RemoteFile {
    RemoteFile::file(
        RemoteId::new(format!("id-{name}")).unwrap(),
        name,
        size,
        Timestamp::from_secs(secs),
    )
}

// ============================================================================
// ScriptedStorage
// ============================================================================

#[derive(Default)]
struct Script {
    listings: VecDeque<Reply<ListDirectoryResponse>>,
    creations: VecDeque<Reply<CreateDirectoryResponse>>,
    downloads: VecDeque<(Reply<bool>, Vec<u8>)>,
    uploads: VecDeque<Reply<Timestamp>>,
    calls: Vec<String>,
    uploaded: HashMap<String, Vec<u8>>,
}

pub struct ScriptedStorage {
    script: Arc<Mutex<Script>>,
    stream_uploads: bool,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            stream_uploads: true,
        }
    }

    pub fn with_path_uploads(mut self) -> Self {
        self.stream_uploads = false;
        self
    }

    pub fn on_list(&self, reply: Reply<ListDirectoryResponse>) -> &Self {
        self.script.lock().unwrap().listings.push_back(reply);
        self
    }

    /// Script a successful listing dated [`listing_date`]
    pub fn listing(&self, files: Vec<RemoteFile>) -> &Self {
        self.on_list(Reply::Now(Ok(ListDirectoryResponse {
            files,
            date: Some(listing_date()),
        })))
    }

    pub fn on_create(&self, reply: Reply<CreateDirectoryResponse>) -> &Self {
        self.script.lock().unwrap().creations.push_back(reply);
        self
    }

    /// Script a download; `content` is written to the destination first
    pub fn on_download(&self, reply: Reply<bool>, content: &[u8]) -> &Self {
        self.script
            .lock()
            .unwrap()
            .downloads
            .push_back((reply, content.to_vec()));
        self
    }

    /// Script an upload answered with the given remote timestamp
    pub fn on_upload(&self, reply: Reply<Timestamp>) -> &Self {
        self.script.lock().unwrap().uploads.push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Content received for an uploaded remote path
    pub fn uploaded(&self, remote_path: &str) -> Option<Vec<u8>> {
        self.script.lock().unwrap().uploaded.get(remote_path).cloned()
    }

    fn record(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }
}

fn resolve<T: Send + 'static>(reply: Option<Reply<T>>, what: &str) -> anyhow::Result<PendingRequest<T>> {
    match reply {
        Some(Reply::Now(result)) => Ok(Box::pin(async move { result })),
        Some(Reply::Never) => Ok(Box::pin(std::future::pending())),
        Some(Reply::Refuse) => Err(anyhow!("storage refused to {what}")),
        None => Err(anyhow!("unscripted request to {what}")),
    }
}

impl ICloudStorage for ScriptedStorage {
    fn name(&self) -> &str {
        "scripted"
    }

    fn list_directory(&self, path: &str) -> anyhow::Result<PendingRequest<ListDirectoryResponse>> {
        self.record(format!("list {path}"));
        let reply = self.script.lock().unwrap().listings.pop_front();
        resolve(reply, "list directory")
    }

    fn create_directory(&self, path: &str) -> anyhow::Result<PendingRequest<CreateDirectoryResponse>> {
        self.record(format!("mkdir {path}"));
        let reply = self.script.lock().unwrap().creations.pop_front();
        resolve(reply, "create directory")
    }

    fn download_by_id(
        &self,
        id: &RemoteId,
        destination: &Path,
        progress: DownloadProgress,
    ) -> anyhow::Result<PendingRequest<bool>> {
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(format!("download {id} -> {file_name}"));

        let Some((reply, content)) = self.script.lock().unwrap().downloads.pop_front() else {
            return Err(anyhow!("unscripted download of {id}"));
        };
        if let Reply::Refuse = reply {
            return Err(anyhow!("storage refused to download {id}"));
        }

        let destination = destination.to_path_buf();
        Ok(Box::pin(async move {
            let total = content.len() as u64;
            tokio::fs::write(&destination, &content)
                .await
                .map_err(|e| ErrorResponse::message(e.to_string()))?;
            progress(total / 2, total);
            match reply {
                Reply::Now(result) => result,
                _ => std::future::pending().await,
            }
        }))
    }

    fn upload(&self, path: &str, source: UploadSource) -> anyhow::Result<PendingRequest<UploadResponse>> {
        let kind = match source {
            UploadSource::Stream(_) => "stream",
            UploadSource::Path(_) => "path",
        };
        self.record(format!("upload {path} ({kind})"));

        let reply = self.script.lock().unwrap().uploads.pop_front();
        let reply = match reply {
            Some(Reply::Refuse) => return Err(anyhow!("storage refused to upload {path}")),
            None => return Err(anyhow!("unscripted upload of {path}")),
            Some(reply) => reply,
        };

        let script = Arc::clone(&self.script);
        let path = path.to_string();
        Ok(Box::pin(async move {
            let content = match source {
                UploadSource::Stream(mut reader) => {
                    let mut buf = Vec::new();
                    reader
                        .read_to_end(&mut buf)
                        .await
                        .map_err(|e| ErrorResponse::message(e.to_string()))?;
                    buf
                }
                UploadSource::Path(local) => tokio::fs::read(&local)
                    .await
                    .map_err(|e| ErrorResponse::message(e.to_string()))?,
            };
            let timestamp = match reply {
                Reply::Now(result) => result?,
                _ => std::future::pending().await,
            };
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            let size = content.len() as u64;
            script.lock().unwrap().uploaded.insert(path.clone(), content);
            Ok(UploadResponse {
                file: RemoteFile::file(RemoteId::new(format!("id-{name}")).unwrap(), name, size, timestamp),
            })
        }))
    }

    fn upload_stream_supported(&self) -> bool {
        self.stream_uploads
    }
}

// ============================================================================
// MemoryIndex
// ============================================================================

#[derive(Default)]
pub struct MemoryIndex {
    map: Mutex<TimestampMap>,
    saves: AtomicUsize,
    fail_load: bool,
}

impl MemoryIndex {
    pub fn with(entries: &[(&str, u32)]) -> Self {
        Self {
            map: Mutex::new(
                entries
                    .iter()
                    .map(|(n, t)| (n.to_string(), Timestamp::from_secs(*t)))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<Timestamp> {
        self.map.lock().unwrap().get(name).copied()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ITimestampIndex for MemoryIndex {
    fn load(&self) -> anyhow::Result<TimestampMap> {
        if self.fail_load {
            return Err(anyhow!("index unreadable"));
        }
        Ok(self.map.lock().unwrap().clone())
    }

    fn save(&self, timestamps: &TimestampMap) -> anyhow::Result<()> {
        *self.map.lock().unwrap() = timestamps.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// TempSaves
// ============================================================================

pub struct TempSaves {
    dir: tempfile::TempDir,
}

impl TempSaves {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn write(&self, name: &str, content: &[u8]) {
        std::fs::write(self.dir.path().join(name), content).unwrap();
    }

    pub fn read(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.dir.path().join(name)).ok()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }
}

impl ISaveStore for TempSaves {
    fn path_for(&self, name: &str) -> anyhow::Result<PathBuf> {
        Ok(self.dir.path().join(name))
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        match std::fs::remove_file(self.path_for(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn open_raw(&self, name: &str) -> anyhow::Result<SaveReader> {
        let file = std::fs::File::open(self.path_for(name)?)?;
        Ok(Box::new(tokio::fs::File::from_std(file)))
    }
}

// ============================================================================
// MemoryStatus
// ============================================================================

#[derive(Default)]
pub struct MemoryStatus {
    last_sync: Mutex<Option<DateTime<Utc>>>,
    used_space: Mutex<Option<u64>>,
}

impl MemoryStatus {
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.lock().unwrap()
    }

    pub fn used_space(&self) -> Option<u64> {
        *self.used_space.lock().unwrap()
    }
}

impl ISyncStatusStore for MemoryStatus {
    fn set_last_sync(&self, date: DateTime<Utc>) -> anyhow::Result<()> {
        *self.last_sync.lock().unwrap() = Some(date);
        Ok(())
    }

    fn set_used_space(&self, bytes: u64) -> anyhow::Result<()> {
        *self.used_space.lock().unwrap() = Some(bytes);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// All collaborators of one orchestrator, kept for later inspection
pub struct Harness {
    pub storage: Arc<ScriptedStorage>,
    pub index: Arc<MemoryIndex>,
    pub saves: Arc<TempSaves>,
    pub status: Arc<MemoryStatus>,
}

impl Harness {
    pub fn new(storage: ScriptedStorage, index: MemoryIndex) -> Self {
        Self {
            storage: Arc::new(storage),
            index: Arc::new(index),
            saves: Arc::new(TempSaves::new()),
            status: Arc::new(MemoryStatus::default()),
        }
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.storage.clone(),
            self.index.clone(),
            self.saves.clone(),
            self.status.clone(),
            REMOTE_DIR,
        )
    }
}
