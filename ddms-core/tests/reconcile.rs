//! End-to-end reconciliation: bulk walk, live descriptors through the
//! pump, and a final walk over the settled tree.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use ddms_config::Config;
use ddms_core::store::{broker, open_in_memory};
use ddms_core::{IndexEngine, StoreHandle};
use ddms_model::{ChangeDescriptor, ChangeKind, ContentHash};

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

async fn engine_for(root: &Path) -> (IndexEngine, StoreHandle) {
    let conn = open_in_memory().await.unwrap();
    let (store, _task) = broker::spawn(conn, Duration::from_secs(5));
    let mut config = Config::default();
    config.index.root_directory = root.to_path_buf();
    config.watch.settle_delay_ms = 40;
    config.watch.tick_interval_ms = 10;
    (IndexEngine::new(Arc::new(config), store.clone()), store)
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition never became true"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn walk_then_live_changes_then_walk_again() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "docs/report.txt", b"report v1");
    write(root, "inbox/scan.txt", b"scan");

    let (engine, store) = engine_for(root).await;

    // Initial bulk load.
    let summary = engine.run_walk().await.unwrap();
    assert_eq!(summary.added, 2);
    assert_eq!(store.count().await.unwrap(), 2);

    let (tx, rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = engine.spawn_pump(rx, shutdown_rx);

    // Live move: the descriptor arrives after the file already moved on
    // disk, exactly as a real notification would.
    std::fs::create_dir_all(root.join("archive")).unwrap();
    std::fs::rename(root.join("docs/report.txt"), root.join("archive/report.txt")).unwrap();
    tx.send(ChangeDescriptor::new(
        ChangeKind::Move {
            dst: "archive/report.txt".into(),
        },
        "docs/report.txt".into(),
    ))
    .await
    .unwrap();

    wait_until(|| async {
        store
            .find_by_path("archive/report.txt")
            .await
            .unwrap()
            .is_some()
    })
    .await;
    assert!(store.find_by_path("docs/report.txt").await.unwrap().is_none());
    assert_eq!(store.count().await.unwrap(), 2, "move minted no new item");
    let moved = store
        .find_by_path("archive/report.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.hash, ContentHash::of_bytes(b"report v1"));

    // Live edit.
    write(root, "archive/report.txt", b"report v2");
    tx.send(ChangeDescriptor::new(
        ChangeKind::Modify,
        "archive/report.txt".into(),
    ))
    .await
    .unwrap();
    wait_until(|| async {
        store
            .find_by_path("archive/report.txt")
            .await
            .unwrap()
            .unwrap()
            .hash
            == ContentHash::of_bytes(b"report v2")
    })
    .await;

    // Live delete.
    std::fs::remove_file(root.join("inbox/scan.txt")).unwrap();
    tx.send(ChangeDescriptor::new(
        ChangeKind::Delete,
        "inbox/scan.txt".into(),
    ))
    .await
    .unwrap();
    wait_until(|| async { store.count().await.unwrap() == 1 }).await;

    shutdown_tx.send(true).unwrap();
    pump.await.unwrap();

    // A fresh walk over the settled tree changes nothing.
    let final_summary = engine.run_walk().await.unwrap();
    assert!(
        final_summary.is_clean(),
        "post-shutdown walk mutated: {final_summary:?}"
    );
    assert_eq!(final_summary.unchanged, 1);
}

#[tokio::test]
async fn duplicate_notifications_are_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "dup.txt", b"once");

    let (engine, store) = engine_for(root).await;
    let (tx, rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = engine.spawn_pump(rx, shutdown_rx);

    // The OS source may duplicate events under load.
    for _ in 0..4 {
        tx.send(ChangeDescriptor::new(ChangeKind::Add, "dup.txt".into()))
            .await
            .unwrap();
    }

    wait_until(|| async { store.count().await.unwrap() == 1 }).await;
    // Give the remaining duplicates time to drain as no-ops.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.count().await.unwrap(), 1);
    let item = store.find_by_path("dup.txt").await.unwrap().unwrap();
    assert_eq!(item.hash, ContentHash::of_bytes(b"once"));

    shutdown_tx.send(true).unwrap();
    pump.await.unwrap();
}
