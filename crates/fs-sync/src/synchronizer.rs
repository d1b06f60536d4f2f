use crate::{
	config::ValidatedConfig,
	error::{report, Error},
	event::{FsEvent, FsEventKind},
	identifier::{NamespacedIdentifier, PathIdentifier, RecordId},
	record::{FsMaterializer, Materializer, Record},
	store::{RecordStore, UpsertOutcome},
};

use std::{fmt, path::Path, sync::Arc};

use tracing::{info, trace};

/// Applies filesystem events to a [`RecordStore`].
///
/// Holds no state of its own besides its collaborators, so it is shared freely between concurrent
/// synchronization tasks. Nothing here serializes calls for the same path, each store call is atomic
/// and the store decides who wins a race.
pub struct Synchronizer {
	store: Arc<dyn RecordStore>,
	materializer: Arc<dyn Materializer>,
	identifier: Arc<dyn PathIdentifier>,
}

impl fmt::Debug for Synchronizer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Synchronizer").finish_non_exhaustive()
	}
}

impl Synchronizer {
	pub fn new(
		store: Arc<dyn RecordStore>,
		materializer: Arc<dyn Materializer>,
		identifier: Arc<dyn PathIdentifier>,
	) -> Self {
		Self {
			store,
			materializer,
			identifier,
		}
	}

	/// Filesystem materializer and name-based ids for the configured root
	pub fn from_config(config: &ValidatedConfig, store: Arc<dyn RecordStore>) -> Self {
		Self::new(
			store,
			Arc::new(FsMaterializer::new(config.root(), config.name())),
			Arc::new(NamespacedIdentifier::new(config.name())),
		)
	}

	#[must_use]
	pub fn id(&self, path: &Path) -> RecordId {
		self.identifier.id(path)
	}

	/// Creates or replaces the record for `path`.
	///
	/// On a materialization failure the store is left untouched; a later event for the same path
	/// gets a fresh attempt.
	pub async fn upsert(&self, path: &Path) -> Result<UpsertOutcome, Error> {
		let id = self.identifier.id(path);

		let record = self.materializer.materialize(id, path).await?;

		let outcome = self.store.create_or_update(record).await?;

		trace!(%id, path = %path.display(), ?outcome, "Synchronized path;");

		Ok(outcome)
	}

	/// Deletes the record for `path` if one is live.
	///
	/// A missing record is not an error: tools routinely write and delete temporary files faster
	/// than we can materialize them.
	pub async fn remove(&self, path: &Path) -> Result<Option<Record>, Error> {
		let id = self.identifier.id(path);

		let Some(record) = self.store.get(&id).await? else {
			trace!(%id, path = %path.display(), "No record to remove;");
			return Ok(None);
		};

		Ok(self.store.delete(&record).await?.then_some(record))
	}

	/// Routes one event to [`upsert`](Self::upsert) or [`remove`](Self::remove).
	///
	/// `announce` only drives the logging policy, see [`CompositeState::announces_changes`](crate::CompositeState::announces_changes).
	pub async fn apply(&self, event: &FsEvent, announce: bool) -> Result<(), Error> {
		if announce {
			info!("{event}");
		}

		match event.kind {
			FsEventKind::Add | FsEventKind::AddDir | FsEventKind::Change => {
				self.upsert(&event.path).await.map(|_| ())
			}
			FsEventKind::Unlink | FsEventKind::UnlinkDir => {
				self.remove(&event.path).await.map(|_| ())
			}
		}
	}

	/// Same as [`apply`](Self::apply) but reports failures instead of returning them, so one bad path
	/// never stops its siblings.
	pub async fn apply_and_report(&self, event: &FsEvent, announce: bool) -> bool {
		match self.apply(event, announce).await {
			Ok(()) => true,
			Err(e) => {
				report(&e);
				false
			}
		}
	}
}
