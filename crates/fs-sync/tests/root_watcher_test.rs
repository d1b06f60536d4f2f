use sd_fs_sync::{CompositeState, Error, InMemoryRecordStore, RootWatcher, StoreChange, SyncConfig};

use std::{sync::Arc, time::Duration};

use tempfile::tempdir;
use tokio::time::{sleep, timeout};
use tracing_test::traced_test;

mod common;

use common::{wait_for_record, SOURCE_NAME};

const PATIENCE: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn keeps_store_in_sync_with_the_tree() {
	let dir = tempdir().unwrap();
	std::fs::create_dir_all(dir.path().join("sub")).unwrap();
	std::fs::create_dir_all(dir.path().join("node_modules/left-pad")).unwrap();
	std::fs::write(dir.path().join("a.txt"), "a").unwrap();
	std::fs::write(dir.path().join("sub/b.txt"), "b").unwrap();
	std::fs::write(dir.path().join("node_modules/left-pad/index.js"), "x").unwrap();

	let store = Arc::new(InMemoryRecordStore::new());
	let mut changes = store.subscribe();

	let watcher = RootWatcher::new(
		&SyncConfig::new(dir.path()).with_name(SOURCE_NAME),
		Arc::clone(&store) as _,
	)
	.unwrap();
	let root = watcher.root().to_path_buf();

	let summary = timeout(PATIENCE, watcher.initial_sync().wait())
		.await
		.unwrap()
		.unwrap();

	// root, a.txt, sub and sub/b.txt
	assert_eq!(summary.queued, 4);
	assert_eq!(summary.failed, 0);
	assert_eq!(store.len().await, 4);
	assert!(store.find_by_path(&root).await.is_some());
	assert!(store.find_by_path(root.join("sub/b.txt")).await.is_some());
	assert!(store.find_by_path(root.join("node_modules")).await.is_none());

	let record = store.find_by_path(root.join("a.txt")).await.unwrap();
	assert_eq!(record.source_name, SOURCE_NAME);
	assert_eq!(record.relative_path, std::path::Path::new("a.txt"));

	assert!(!logs_contain("added file at"));

	let mut states = watcher.subscribe_state();
	watcher.bootstrap_finished();
	watcher.bootstrap_finished();
	timeout(
		PATIENCE,
		states.wait_for(|state| *state == CompositeState::WatchingReadyBootstrapped),
	)
	.await
	.unwrap()
	.unwrap();
	assert_eq!(watcher.state(), CompositeState::WatchingReadyBootstrapped);

	std::fs::write(root.join("c.txt"), "c").unwrap();
	let c = wait_for_record(&store, root.join("c.txt")).await;
	assert_eq!(c.extension, "txt");

	std::fs::remove_file(root.join("a.txt")).unwrap();
	timeout(PATIENCE, async {
		while store.find_by_path(root.join("a.txt")).await.is_some() {
			sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap();

	watcher.shutdown().await;

	assert!(logs_contain("added file at"));
	assert!(logs_contain("file deleted at"));
	assert!(logs_contain("Root watcher gracefully shutdown"));

	let mut deleted = false;
	while let Ok(change) = changes.try_recv() {
		if let StoreChange::Deleted(record) = change {
			assert_eq!(record.base, "a.txt");
			deleted = true;
		}
	}
	assert!(deleted);
}

#[tokio::test]
async fn missing_root_is_fatal() {
	let dir = tempdir().unwrap();

	let e = RootWatcher::new(
		&SyncConfig::new(dir.path().join("missing")),
		Arc::new(InMemoryRecordStore::new()),
	)
	.unwrap_err();

	assert!(matches!(e, Error::RootNotFound(_)));
	assert!(e.is_fatal());
}

#[tokio::test]
async fn invalid_ignore_glob_is_fatal() {
	let dir = tempdir().unwrap();

	let e = RootWatcher::new(
		&SyncConfig::new(dir.path()).with_ignore(["{unclosed"]),
		Arc::new(InMemoryRecordStore::new()),
	)
	.unwrap_err();

	assert!(matches!(e, Error::InvalidGlob(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_root_settles_with_the_root_record() {
	let dir = tempdir().unwrap();
	let store = Arc::new(InMemoryRecordStore::new());

	let watcher = RootWatcher::new(&SyncConfig::new(dir.path()), Arc::clone(&store) as _).unwrap();

	let summary = timeout(PATIENCE, watcher.initial_sync().wait())
		.await
		.unwrap()
		.unwrap();

	assert_eq!(summary.queued, 1);
	assert_eq!(watcher.state(), CompositeState::WatchingReady);
	assert_eq!(store.len().await, 1);

	drop(watcher);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_right_after_start_keeps_the_initial_scan() {
	let dir = tempdir().unwrap();
	for i in 0..2000 {
		std::fs::write(dir.path().join(format!("{i}.txt")), "x").unwrap();
	}

	let store = Arc::new(InMemoryRecordStore::new());

	let watcher = RootWatcher::new(&SyncConfig::new(dir.path()), Arc::clone(&store) as _).unwrap();
	let initial_sync = watcher.initial_sync();

	watcher.shutdown().await;

	let summary = timeout(PATIENCE, initial_sync.wait())
		.await
		.unwrap()
		.unwrap();

	assert_eq!(summary.queued, 2001);
	assert_eq!(summary.failed, 0);
	assert_eq!(store.len().await, 2001);
}
