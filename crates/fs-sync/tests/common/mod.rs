#![allow(dead_code)]

use sd_fs_sync::{
	FsMaterializer, InMemoryRecordStore, MaterializeError, Materializer, NamespacedIdentifier,
	Record, RecordId, SyncConfig, Synchronizer, ValidatedConfig,
};

use std::{
	collections::HashSet,
	io,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use tokio::{sync::Semaphore, time::timeout};

pub const SOURCE_NAME: &str = "test";

/// A temporary root populated with `files`, paths relative to the root.
pub fn root_with(files: &[&str]) -> (TempDir, ValidatedConfig) {
	let dir = tempdir().unwrap();

	for file in files {
		let path = dir.path().join(file);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap();
		}
		std::fs::write(&path, file.as_bytes()).unwrap();
	}

	let config = SyncConfig::new(dir.path())
		.with_name(SOURCE_NAME)
		.validate()
		.unwrap();

	(dir, config)
}

pub fn synchronizer(
	config: &ValidatedConfig,
	store: &Arc<InMemoryRecordStore>,
	materializer: impl Materializer,
) -> Arc<Synchronizer> {
	Arc::new(Synchronizer::new(
		Arc::clone(store) as _,
		Arc::new(materializer),
		Arc::new(NamespacedIdentifier::new(config.name())),
	))
}

/// Polls the store until `path` has a record, there is no completion signal for single events
pub async fn wait_for_record(store: &InMemoryRecordStore, path: impl AsRef<Path>) -> Record {
	let path = path.as_ref();

	timeout(Duration::from_secs(5), async {
		loop {
			if let Some(record) = store.find_by_path(path).await {
				return record;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("no record for {} in time", path.display()))
}

/// Holds materialization of one path until [`GatedMaterializer::open`] is called.
#[derive(Debug, Clone)]
pub struct GatedMaterializer {
	inner: FsMaterializer,
	gated: PathBuf,
	gate: Arc<Semaphore>,
}

impl GatedMaterializer {
	pub fn new(config: &ValidatedConfig, gated: impl Into<PathBuf>) -> Self {
		Self {
			inner: FsMaterializer::new(config.root(), config.name()),
			gated: gated.into(),
			gate: Arc::new(Semaphore::new(0)),
		}
	}

	pub fn open(&self) {
		self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
	}
}

#[async_trait]
impl Materializer for GatedMaterializer {
	async fn materialize(&self, id: RecordId, path: &Path) -> Result<Record, MaterializeError> {
		if path == self.gated {
			let _permit = self.gate.acquire().await.unwrap();
		}

		self.inner.materialize(id, path).await
	}
}

/// Fails with `PermissionDenied` for the given paths and behaves normally for the others.
#[derive(Debug, Clone)]
pub struct FailingMaterializer {
	inner: FsMaterializer,
	failing: HashSet<PathBuf>,
}

impl FailingMaterializer {
	pub fn new(config: &ValidatedConfig, failing: impl IntoIterator<Item = PathBuf>) -> Self {
		Self {
			inner: FsMaterializer::new(config.root(), config.name()),
			failing: failing.into_iter().collect(),
		}
	}
}

#[async_trait]
impl Materializer for FailingMaterializer {
	async fn materialize(&self, id: RecordId, path: &Path) -> Result<Record, MaterializeError> {
		if self.failing.contains(path) {
			return Err(MaterializeError::from_std_io_err(
				path,
				io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
			));
		}

		self.inner.materialize(id, path).await
	}
}
