use std::{
	fmt::{self, Display},
	io,
	path::Path,
};

use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum Error {
	// Configuration, fatal at startup
	#[error("root path does not exist on the file system: <path='{}'>", .0.display())]
	RootNotFound(Box<Path>),
	#[error("root path is not a directory: <path='{}'>", .0.display())]
	RootNotDirectory(Box<Path>),
	#[error("unable to resolve the current working directory for a relative root: {0}")]
	WorkingDirectory(#[source] io::Error),
	#[error("invalid ignore glob: {0}")]
	InvalidGlob(#[from] globset::Error),

	#[error("watcher error: {0}")]
	Watcher(#[from] notify::Error),
	#[error("initial synchronization was dropped before the queue drained")]
	InitialSyncDropped,

	#[error(transparent)]
	Materialize(#[from] MaterializeError),
	#[error(transparent)]
	Store(#[from] StoreError),
}

impl Error {
	/// Fatal errors abort startup; everything else is reported per event and intake goes on.
	#[must_use]
	pub const fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::RootNotFound(_)
				| Self::RootNotDirectory(_)
				| Self::WorkingDirectory(_)
				| Self::InvalidGlob(_)
		)
	}

	#[must_use]
	pub const fn is_recoverable(&self) -> bool {
		matches!(self, Self::Materialize(_))
	}
}

/// Report a per-event error with tracing, warnings for recoverable ones.
pub fn report(e: &Error) {
	if e.is_recoverable() {
		warn!("{e:#}");
	} else {
		error!("{e:#}");
	}
}

/// A path could not be turned into a record, usually because it vanished before we could stat it
#[derive(Debug, Error)]
pub struct MaterializeError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
	pub maybe_context: Option<&'static str>,
}

impl Display for MaterializeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"unable to materialize record{}: {}; path: '{}'",
			self.maybe_context
				.map(|ctx| format!(" ({ctx})"))
				.unwrap_or_default(),
			self.source,
			self.path.display()
		)
	}
}

impl MaterializeError {
	pub fn from_std_io_err(path: impl AsRef<Path>, source: io::Error) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}

	pub fn from_std_io_err_with_msg(
		path: impl AsRef<Path>,
		source: io::Error,
		msg: &'static str,
	) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(msg),
		}
	}

	#[must_use]
	pub fn is_not_found(&self) -> bool {
		self.source.kind() == io::ErrorKind::NotFound
	}
}

/// Failure reported by a [`RecordStore`](crate::RecordStore) backend
#[derive(Debug, Error)]
#[error("record store error: {0}")]
pub struct StoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
	pub fn new(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
		Self(e.into())
	}
}
