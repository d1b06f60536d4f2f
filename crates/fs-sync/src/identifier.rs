use std::{
	fmt,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable key of a [`Record`](crate::Record), derived from its absolute path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
	#[must_use]
	pub const fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl From<Uuid> for RecordId {
	fn from(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Maps an absolute path to its [`RecordId`].
///
/// Implementations must be pure: the same path always yields the same id for the lifetime of a run,
/// and different paths never share one. The id is used both to create records and to find them again
/// on deletion, so any drift between the two calls leaks records.
pub trait PathIdentifier: Send + Sync + 'static {
	fn id(&self, path: &Path) -> RecordId;
}

/// Name-based UUIDv5 ids scoped to a source instance.
///
/// Two roots synchronized under different source names never collide, even when a path is shared.
#[derive(Debug, Clone)]
pub struct NamespacedIdentifier {
	namespace: Uuid,
}

impl NamespacedIdentifier {
	pub fn new(source_name: impl AsRef<str>) -> Self {
		Self {
			namespace: Uuid::new_v5(&Uuid::NAMESPACE_OID, source_name.as_ref().as_bytes()),
		}
	}
}

impl PathIdentifier for NamespacedIdentifier {
	fn id(&self, path: &Path) -> RecordId {
		RecordId(Uuid::new_v5(
			&self.namespace,
			canonical_key(path).as_os_str().as_encoded_bytes(),
		))
	}
}

/// Collapses representations of the same path: redundant separators, inner `.` components and, on
/// case insensitive platforms, letter case.
pub(crate) fn canonical_key(path: &Path) -> PathBuf {
	let collected = path.components().collect::<PathBuf>();

	if cfg!(windows) {
		PathBuf::from(collected.to_string_lossy().to_lowercase())
	} else {
		collected
	}
}
