//! Cancellation, restart and drop while a request is in flight

use std::time::Duration;

use cloudsaves_core::domain::Timestamp;
use cloudsaves_sync::machine::SyncPhase;
use cloudsaves_sync::{SyncError, SyncOrchestrator};

use crate::common::{remote, Harness, MemoryIndex, Reply, ScriptedStorage};

/// Pump for a while; the run must still be waiting on its request afterwards
async fn pump_until_stalled(orch: &mut SyncOrchestrator) {
    let pumped = tokio::time::timeout(Duration::from_millis(100), orch.pump()).await;
    assert!(pumped.is_err(), "run finished instead of stalling: {pumped:?}");
}

fn stalled_download() -> Harness {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 100, 8)])
        .on_download(Reply::Never, b"part");
    Harness::new(storage, MemoryIndex::default())
}

#[tokio::test]
async fn test_cancel_deletes_partial_download() {
    let h = stalled_download();
    let mut orch = h.orchestrator();
    orch.start();
    pump_until_stalled(&mut orch).await;

    assert_eq!(orch.phase(), &SyncPhase::Downloading);
    assert!(h.saves.exists("a.sav"));
    assert_eq!(orch.files_to_download(), vec!["a.sav".to_string()]);
    // Half of the file was reported
    assert_eq!(orch.downloading_info().bytes_downloaded, 4);

    orch.cancel();

    assert!(!h.saves.exists("a.sav"));
    assert_eq!(orch.phase(), &SyncPhase::Cancelled);
    assert!(!orch.is_running());
    assert!(orch.pump().await.is_none());
    assert_eq!(h.index.save_count(), 0);
}

#[tokio::test]
async fn test_cancel_from_select_branch() {
    let h = stalled_download();
    let mut orch = h.orchestrator();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    orch.start();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = stop.send(());
    });

    tokio::select! {
        outcome = orch.pump() => panic!("run should not finish: {outcome:?}"),
        _ = stopped => orch.cancel(),
    }

    assert_eq!(orch.phase(), &SyncPhase::Cancelled);
    assert!(!h.saves.exists("a.sav"));
}

#[tokio::test]
async fn test_drop_cancels_run_and_deletes_partial_download() {
    let h = stalled_download();
    {
        let mut orch = h.orchestrator();
        orch.start();
        pump_until_stalled(&mut orch).await;
        assert!(h.saves.exists("a.sav"));
    }

    assert!(!h.saves.exists("a.sav"));
}

#[tokio::test]
async fn test_restart_discards_partial_download_and_syncs_again() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("a.sav", 100, 4)])
        .on_download(Reply::Never, b"pa")
        .listing(vec![remote("a.sav", 100, 4)])
        .on_download(Reply::Now(Ok(true)), b"full");
    let h = Harness::new(storage, MemoryIndex::default());
    let mut orch = h.orchestrator();
    orch.start();
    pump_until_stalled(&mut orch).await;

    orch.restart();
    assert!(!h.saves.exists("a.sav"));
    assert_eq!(orch.phase(), &SyncPhase::ListingDirectory);

    let summary = orch
        .pump()
        .await
        .expect("restarted run should report an outcome")
        .expect("restarted run should succeed");

    assert_eq!(summary.files_downloaded, 1);
    assert_eq!(h.saves.read("a.sav").as_deref(), Some(&b"full"[..]));
    assert_eq!(h.index.get("a.sav"), Some(Timestamp::from_secs(100)));
}

#[tokio::test]
async fn test_restart_ignores_completion_of_previous_run() {
    let storage = ScriptedStorage::new();
    storage
        .listing(vec![remote("stale.sav", 100, 4)])
        .listing(Vec::new());
    let h = Harness::new(storage, MemoryIndex::default());
    let mut orch = h.orchestrator();

    orch.start();
    // Let the first listing resolve without handling it
    tokio::time::sleep(Duration::from_millis(20)).await;
    orch.restart();

    let summary = orch
        .pump()
        .await
        .expect("restarted run should report an outcome")
        .expect("restarted run should succeed");

    assert_eq!(summary.files_downloaded, 0);
    assert_eq!(
        h.storage.calls(),
        vec!["list /saves".to_string(), "list /saves".to_string()]
    );
    assert_eq!(h.status.used_space(), Some(0));
}

#[tokio::test]
async fn test_idle_orchestrator_has_nothing_to_pump() {
    let h = Harness::new(ScriptedStorage::new(), MemoryIndex::default());
    let mut orch = h.orchestrator();

    // Never started: nothing to pump
    assert!(orch.pump().await.is_none());
    assert_eq!(orch.phase(), &SyncPhase::Idle);

    orch.cancel();
    assert_eq!(orch.phase(), &SyncPhase::Idle);
    // Unscripted listing is refused
    assert!(matches!(
        orch.run().await,
        Err(SyncError::CouldNotStart { .. })
    ));
}

#[tokio::test]
async fn test_cancel_during_upload_leaves_local_file() {
    let storage = ScriptedStorage::new();
    storage.listing(Vec::new()).on_upload(Reply::Never);
    let h = Harness::new(storage, MemoryIndex::with(&[("a.sav", 3)]));
    h.saves.write("a.sav", b"keep me");
    let mut orch = h.orchestrator();
    orch.start();
    pump_until_stalled(&mut orch).await;

    assert_eq!(orch.phase(), &SyncPhase::Uploading);
    orch.cancel();

    assert_eq!(orch.phase(), &SyncPhase::Cancelled);
    assert_eq!(h.saves.read("a.sav").as_deref(), Some(&b"keep me"[..]));
    assert_eq!(h.index.get("a.sav"), Some(Timestamp::from_secs(3)));
}
