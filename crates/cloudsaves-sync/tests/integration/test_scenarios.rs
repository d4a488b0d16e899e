//! End-to-end sync runs that complete successfully

use chrono::Utc;
use cloudsaves_core::domain::{ErrorResponse, Timestamp};
use cloudsaves_core::ports::{CreateDirectoryResponse, ListDirectoryResponse};
use cloudsaves_sync::filter::SyncFilter;
use cloudsaves_sync::machine::SyncPhase;

use crate::common::{listing_date, remote, Harness, MemoryIndex, Reply, ScriptedStorage};

#[tokio::test]
async fn test_downloads_missing_and_newer_remote_files() {
    // Queues are drained from the back
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 100, 4), remote("b.sav", 300, 6)])
        .on_download(Reply::Now(Ok(true)), b"bbbbbb")
        .on_download(Reply::Now(Ok(true)), b"aaaa");
    let h = Harness::new(storage, MemoryIndex::with(&[("b.sav", 200)]));
    let mut orch = h.orchestrator();

    let summary = orch.run().await.expect("sync should succeed");

    assert_eq!(summary.files_downloaded, 2);
    assert_eq!(summary.files_uploaded, 0);
    assert_eq!(summary.bytes_downloaded, 10);
    assert_eq!(summary.last_sync, listing_date());
    assert_eq!(
        h.storage.calls(),
        vec![
            "list /saves".to_string(),
            "download id-b.sav -> b.sav".to_string(),
            "download id-a.sav -> a.sav".to_string(),
        ]
    );
    assert_eq!(h.saves.read("a.sav").as_deref(), Some(&b"aaaa"[..]));
    assert_eq!(h.saves.read("b.sav").as_deref(), Some(&b"bbbbbb"[..]));
    assert_eq!(h.index.get("a.sav"), Some(Timestamp::from_secs(100)));
    assert_eq!(h.index.get("b.sav"), Some(Timestamp::from_secs(300)));
    assert_eq!(orch.phase(), &SyncPhase::Succeeded);
}

#[tokio::test]
async fn test_uploads_newer_and_local_only_files() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 100, 4), remote("same.sav", 50, 1)])
        .on_upload(Reply::Now(Ok(Timestamp::from_secs(500))))
        .on_upload(Reply::Now(Ok(Timestamp::from_secs(501))));
    let h = Harness::new(
        storage,
        MemoryIndex::with(&[("a.sav", 200), ("same.sav", 50), ("z.sav", 10)]),
    );
    h.saves.write("a.sav", b"local a");
    h.saves.write("z.sav", b"local z");
    let mut orch = h.orchestrator();

    let summary = orch.run().await.expect("sync should succeed");

    assert_eq!(summary.files_uploaded, 2);
    assert_eq!(summary.files_downloaded, 0);
    assert_eq!(
        h.storage.calls(),
        vec![
            "list /saves".to_string(),
            "upload /saves/z.sav (stream)".to_string(),
            "upload /saves/a.sav (stream)".to_string(),
        ]
    );
    assert_eq!(h.storage.uploaded("/saves/a.sav").as_deref(), Some(&b"local a"[..]));
    assert_eq!(h.storage.uploaded("/saves/z.sav").as_deref(), Some(&b"local z"[..]));
    // Index takes the timestamps the storage assigned
    assert_eq!(h.index.get("z.sav"), Some(Timestamp::from_secs(500)));
    assert_eq!(h.index.get("a.sav"), Some(Timestamp::from_secs(501)));
    assert_eq!(h.index.get("same.sav"), Some(Timestamp::from_secs(50)));
}

#[tokio::test]
async fn test_uploads_by_path_when_streams_unsupported() {
    let storage = ScriptedStorage::new().with_path_uploads();
    storage
        .listing(Vec::new())
        .on_upload(Reply::Now(Ok(Timestamp::from_secs(42))));
    let h = Harness::new(storage, MemoryIndex::with(&[("slot1.sav", 7)]));
    h.saves.write("slot1.sav", b"slot one");
    let mut orch = h.orchestrator();

    orch.run().await.expect("sync should succeed");

    assert_eq!(
        h.storage.calls(),
        vec!["list /saves".to_string(), "upload /saves/slot1.sav (path)".to_string()]
    );
    assert_eq!(h.storage.uploaded("/saves/slot1.sav").as_deref(), Some(&b"slot one"[..]));
}

#[tokio::test]
async fn test_index_persisted_after_each_transfer() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 100, 1), remote("b.sav", 100, 1)])
        .on_download(Reply::Now(Ok(true)), b"a")
        .on_download(Reply::Now(Ok(true)), b"b")
        .on_upload(Reply::Now(Ok(Timestamp::from_secs(9))));
    let h = Harness::new(storage, MemoryIndex::with(&[("c.sav", 1)]));
    h.saves.write("c.sav", b"c");
    let mut orch = h.orchestrator();

    orch.run().await.expect("sync should succeed");

    assert_eq!(h.index.save_count(), 3);
}

#[tokio::test]
async fn test_records_used_space_and_last_sync() {
    let storage = ScriptedStorage::new();
    storage.listing(vec![
        remote("a.sav", 1, 100),
        remote("b.sav", 1, 23),
        remote(".hidden", 1, 1000),
        remote("timestamps", 1, 1000),
    ]);
    let h = Harness::new(storage, MemoryIndex::with(&[("a.sav", 1), ("b.sav", 1)]));
    let mut orch = h.orchestrator();

    orch.run().await.expect("sync should succeed");

    assert_eq!(h.status.used_space(), Some(2123));
    assert_eq!(h.status.last_sync(), Some(listing_date()));
    assert!(h.storage.calls().iter().all(|c| !c.contains(".hidden")));
}

#[tokio::test]
async fn test_last_sync_falls_back_to_now_without_response_date() {
    let storage = ScriptedStorage::new();
    storage.on_list(Reply::Now(Ok(ListDirectoryResponse {
        files: Vec::new(),
        date: None,
    })));
    let h = Harness::new(storage, MemoryIndex::default());
    let mut orch = h.orchestrator();

    let before = Utc::now();
    let summary = orch.run().await.expect("sync should succeed");
    let after = Utc::now();

    assert!(summary.last_sync >= before && summary.last_sync <= after);
    assert_eq!(h.status.last_sync(), Some(summary.last_sync));
}

#[tokio::test]
async fn test_missing_remote_folder_is_created_then_local_files_uploaded() {
    let storage = ScriptedStorage::new();
    storage
        .on_list(Reply::Now(Err(ErrorResponse::failed(
            r#"{"error_summary": "path/not_found/.."}"#,
            409,
        ))))
        .on_create(Reply::Now(Ok(CreateDirectoryResponse {
            created: true,
            date: Some(listing_date()),
        })))
        .on_upload(Reply::Now(Ok(Timestamp::from_secs(77))));
    let h = Harness::new(storage, MemoryIndex::with(&[("a.sav", 5)]));
    h.saves.write("a.sav", b"a");
    let mut orch = h.orchestrator();

    let summary = orch.run().await.expect("sync should succeed");

    assert_eq!(summary.files_uploaded, 1);
    assert_eq!(
        h.storage.calls(),
        vec![
            "list /saves".to_string(),
            "mkdir /saves".to_string(),
            "upload /saves/a.sav (stream)".to_string(),
        ]
    );
    assert_eq!(h.status.used_space(), Some(0));
}

#[tokio::test]
async fn test_excluded_files_are_never_transferred() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("keep.sav", 10, 1), remote("skip.tmp", 10, 50)])
        .on_download(Reply::Now(Ok(true)), b"k");
    let h = Harness::new(storage, MemoryIndex::with(&[("other.tmp", 3)]));
    let mut orch = h.orchestrator().with_filter(SyncFilter::new(&["*.tmp"]));

    let summary = orch.run().await.expect("sync should succeed");

    assert_eq!(summary.files_downloaded, 1);
    assert_eq!(summary.files_uploaded, 0);
    assert_eq!(h.status.used_space(), Some(51));
}

#[tokio::test]
async fn test_names_with_path_components_are_never_downloaded() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![
            remote("a/../../escape.sav", 10, 4),
            remote("..", 10, 4),
            remote("nested\\slot.sav", 10, 4),
            remote("keep.sav", 10, 1),
        ])
        .on_download(Reply::Now(Ok(true)), b"k");
    let h = Harness::new(storage, MemoryIndex::default());
    let mut orch = h.orchestrator();

    let summary = orch.run().await.expect("sync should succeed");

    assert_eq!(summary.files_downloaded, 1);
    let downloads: Vec<_> = h
        .storage
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("download"))
        .collect();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].ends_with("keep.sav"));
}

#[tokio::test]
async fn test_snapshot_published_on_completion() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 10, 8)])
        .on_download(Reply::Now(Ok(true)), b"12345678");
    let h = Harness::new(storage, MemoryIndex::default());
    let mut orch = h.orchestrator();
    let snapshots = orch.subscribe();

    orch.run().await.expect("sync should succeed");

    let last = snapshots.borrow().clone();
    assert_eq!(last.phase, SyncPhase::Succeeded);
    assert!((last.progress - 1.0).abs() < f64::EPSILON);
    assert!((last.download_progress - 1.0).abs() < f64::EPSILON);
    assert_eq!(last.downloading.files_downloaded, 1);
    assert_eq!(last.downloading.bytes_downloaded, 8);
    assert!(last.files_to_download.is_empty());
    assert_eq!(last, orch.snapshot());
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 10, 2)])
        .on_download(Reply::Now(Ok(true)), b"aa")
        .listing(vec![remote("a.sav", 10, 2)]);
    let h = Harness::new(storage, MemoryIndex::default());
    let mut orch = h.orchestrator();

    orch.run().await.expect("first sync should succeed");
    let summary = orch.run().await.expect("second sync should succeed");

    assert_eq!(summary.files_downloaded, 0);
    assert_eq!(summary.files_uploaded, 0);
    assert_eq!(h.storage.calls().len(), 3);
}
