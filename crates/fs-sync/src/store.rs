use crate::{error::StoreError, identifier::RecordId, record::Record};

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

const CHANGES_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
	Created,
	Updated,
	/// Same payload as the live record, nothing was written
	Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
	Created(Record),
	Updated(Record),
	Deleted(Record),
}

impl StoreChange {
	#[must_use]
	pub const fn record(&self) -> &Record {
		match self {
			Self::Created(record) | Self::Updated(record) | Self::Deleted(record) => record,
		}
	}
}

/// Sole owner of records and the only source of truth for their existence.
///
/// Each call must be atomic on its own. Concurrent calls for the same id are expected (filesystem
/// events outrun materialization) and resolve as last writer wins.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
	async fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError>;

	async fn create_or_update(&self, record: Record) -> Result<UpsertOutcome, StoreError>;

	/// Returns `false` when no record was live under `record.id`.
	async fn delete(&self, record: &Record) -> Result<bool, StoreError>;
}

#[derive(Debug)]
pub struct InMemoryRecordStore {
	records: RwLock<HashMap<RecordId, Record>>,
	changes_tx: broadcast::Sender<StoreChange>,
}

impl Default for InMemoryRecordStore {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryRecordStore {
	#[must_use]
	pub fn new() -> Self {
		let (changes_tx, _) = broadcast::channel(CHANGES_CHANNEL_CAPACITY);

		Self {
			records: RwLock::default(),
			changes_tx,
		}
	}

	/// Receive every effective mutation from now on, `Unchanged` upserts are not broadcast.
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
		self.changes_tx.subscribe()
	}

	pub async fn len(&self) -> usize {
		self.records.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.records.read().await.is_empty()
	}

	pub async fn find_by_path(&self, path: impl AsRef<Path>) -> Option<Record> {
		let path = path.as_ref();
		self.records
			.read()
			.await
			.values()
			.find(|record| record.absolute_path == path)
			.cloned()
	}

	/// All live records ordered by path
	pub async fn snapshot(&self) -> Vec<Record> {
		let mut records = self
			.records
			.read()
			.await
			.values()
			.cloned()
			.collect::<Vec<_>>();

		records.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));

		records
	}

	fn notify(&self, change: StoreChange) {
		// No subscribers is fine
		let _ = self.changes_tx.send(change);
	}
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
	async fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
		Ok(self.records.read().await.get(id).cloned())
	}

	async fn create_or_update(&self, record: Record) -> Result<UpsertOutcome, StoreError> {
		let outcome = {
			let mut records = self.records.write().await;

			match records.insert(record.id, record.clone()) {
				None => UpsertOutcome::Created,
				Some(previous) if record.is_unchanged_from(&previous) => UpsertOutcome::Unchanged,
				Some(_) => UpsertOutcome::Updated,
			}
		};

		trace!(id = %record.id, ?outcome, "Upserted record;");

		match outcome {
			UpsertOutcome::Created => self.notify(StoreChange::Created(record)),
			UpsertOutcome::Updated => self.notify(StoreChange::Updated(record)),
			UpsertOutcome::Unchanged => {}
		}

		Ok(outcome)
	}

	async fn delete(&self, record: &Record) -> Result<bool, StoreError> {
		let removed = self.records.write().await.remove(&record.id);

		Ok(removed.map_or(false, |removed| {
			trace!(id = %removed.id, "Deleted record;");
			self.notify(StoreChange::Deleted(removed));
			true
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::RecordKind;

	use chrono::{TimeZone, Utc};
	use uuid::Uuid;

	fn record(path: &str, size: u64) -> Record {
		let epoch = Utc.timestamp_opt(0, 0).unwrap();
		Record {
			id: RecordId::from(Uuid::new_v5(&Uuid::NAMESPACE_URL, path.as_bytes())),
			source_name: "fs".to_string(),
			kind: RecordKind::File,
			absolute_path: path.into(),
			relative_path: path.trim_start_matches('/').into(),
			relative_directory: "".into(),
			base: path.trim_start_matches('/').to_string(),
			name: path.trim_start_matches('/').to_string(),
			extension: String::new(),
			size,
			created_at: epoch,
			modified_at: epoch,
			accessed_at: epoch,
			inode: None,
			device: None,
			mode: None,
		}
	}

	#[tokio::test]
	async fn upsert_outcomes() {
		let store = InMemoryRecordStore::new();
		let mut changes = store.subscribe();

		assert_eq!(
			store.create_or_update(record("/a", 1)).await.unwrap(),
			UpsertOutcome::Created
		);
		assert_eq!(
			store.create_or_update(record("/a", 1)).await.unwrap(),
			UpsertOutcome::Unchanged
		);
		assert_eq!(
			store.create_or_update(record("/a", 2)).await.unwrap(),
			UpsertOutcome::Updated
		);
		assert_eq!(store.len().await, 1);

		assert!(matches!(changes.recv().await.unwrap(), StoreChange::Created(_)));
		assert!(
			matches!(changes.recv().await.unwrap(), StoreChange::Updated(r) if r.size == 2)
		);
		assert!(changes.try_recv().is_err());
	}

	#[tokio::test]
	async fn access_time_alone_is_not_a_change() {
		let store = InMemoryRecordStore::new();
		store.create_or_update(record("/a", 1)).await.unwrap();

		let mut touched = record("/a", 1);
		touched.accessed_at = Utc.timestamp_opt(60, 0).unwrap();

		assert_eq!(
			store.create_or_update(touched).await.unwrap(),
			UpsertOutcome::Unchanged
		);
	}

	#[tokio::test]
	async fn delete_missing_is_false() {
		let store = InMemoryRecordStore::new();
		let a = record("/a", 1);

		assert!(!store.delete(&a).await.unwrap());

		store.create_or_update(a.clone()).await.unwrap();
		assert!(store.delete(&a).await.unwrap());
		assert!(store.is_empty().await);
		assert!(store.get(&a.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn snapshot_is_sorted_by_path() {
		let store = InMemoryRecordStore::new();
		store.create_or_update(record("/b", 1)).await.unwrap();
		store.create_or_update(record("/a", 1)).await.unwrap();

		let paths = store
			.snapshot()
			.await
			.into_iter()
			.map(|record| record.absolute_path)
			.collect::<Vec<_>>();

		assert_eq!(paths, vec![Path::new("/a"), Path::new("/b")]);
		assert!(store.find_by_path("/b").await.is_some());
	}
}
