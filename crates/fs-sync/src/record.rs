use crate::{error::MaterializeError, identifier::RecordId};

use std::{
	fs::Metadata,
	path::{Path, PathBuf},
	time::SystemTime,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
	File,
	Directory,
	Symlink,
}

impl RecordKind {
	fn from_metadata(metadata: &Metadata) -> Self {
		let file_type = metadata.file_type();
		if file_type.is_symlink() {
			Self::Symlink
		} else if file_type.is_dir() {
			Self::Directory
		} else {
			Self::File
		}
	}
}

/// One filesystem entry as seen by the record store.
///
/// Directories and files share this shape, only `kind`, `extension` and `size` tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
	pub id: RecordId,
	/// Name of the source instance that produced this record
	pub source_name: String,
	pub kind: RecordKind,

	pub absolute_path: PathBuf,
	pub relative_path: PathBuf,
	pub relative_directory: PathBuf,
	/// File name with extension
	pub base: String,
	/// File name without extension
	pub name: String,
	/// Lowercase, without the leading dot; empty for directories
	pub extension: String,

	pub size: u64,
	pub created_at: DateTime<Utc>,
	pub modified_at: DateTime<Utc>,
	pub accessed_at: DateTime<Utc>,

	pub inode: Option<u64>,
	pub device: Option<u64>,
	pub mode: Option<u32>,
}

impl Record {
	/// Payload equality that ignores the access time, reading a file is not changing it
	#[must_use]
	pub fn is_unchanged_from(&self, previous: &Self) -> bool {
		Self {
			accessed_at: previous.accessed_at,
			..self.clone()
		} == *previous
	}
}

/// Turns a path into a [`Record`] payload.
///
/// The path may disappear between the event and this call, implementations must report that as a
/// [`MaterializeError`] and never panic.
#[async_trait]
pub trait Materializer: Send + Sync + 'static {
	async fn materialize(&self, id: RecordId, path: &Path) -> Result<Record, MaterializeError>;
}

/// Builds records from `lstat` metadata.
#[derive(Debug, Clone)]
pub struct FsMaterializer {
	root: PathBuf,
	source_name: String,
}

impl FsMaterializer {
	pub fn new(root: impl Into<PathBuf>, source_name: impl Into<String>) -> Self {
		Self {
			root: root.into(),
			source_name: source_name.into(),
		}
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}
}

#[async_trait]
impl Materializer for FsMaterializer {
	async fn materialize(&self, id: RecordId, path: &Path) -> Result<Record, MaterializeError> {
		let metadata = fs::symlink_metadata(path).await.map_err(|e| {
			MaterializeError::from_std_io_err_with_msg(path, e, "reading metadata")
		})?;

		Ok(build_record(
			id,
			&self.source_name,
			&self.root,
			path,
			&metadata,
		))
	}
}

fn build_record(
	id: RecordId,
	source_name: &str,
	root: &Path,
	path: &Path,
	metadata: &Metadata,
) -> Record {
	let kind = RecordKind::from_metadata(metadata);

	let relative_path = path
		.strip_prefix(root)
		.map_or_else(|_| path.to_path_buf(), Path::to_path_buf);
	let relative_directory = relative_path
		.parent()
		.map(Path::to_path_buf)
		.unwrap_or_default();

	let base = path
		.file_name()
		.map(|name| name.to_string_lossy().to_string())
		.unwrap_or_default();

	let (name, extension) = if kind == RecordKind::Directory {
		(base.clone(), String::new())
	} else {
		(
			path.file_stem()
				.map(|stem| stem.to_string_lossy().to_string())
				.unwrap_or_else(|| base.clone()),
			path.extension()
				.map(|ext| ext.to_string_lossy().to_lowercase())
				.unwrap_or_default(),
		)
	};

	let (inode, device, mode) = unix_ids(metadata);

	Record {
		id,
		source_name: source_name.to_string(),
		kind,
		absolute_path: path.to_path_buf(),
		relative_path,
		relative_directory,
		base,
		name,
		extension,
		size: if kind == RecordKind::Directory {
			0
		} else {
			metadata.len()
		},
		created_at: metadata.created_or_modified().into(),
		modified_at: metadata.modified_or_now().into(),
		accessed_at: metadata.accessed_or_now().into(),
		inode,
		device,
		mode,
	}
}

#[cfg(unix)]
fn unix_ids(metadata: &Metadata) -> (Option<u64>, Option<u64>, Option<u32>) {
	use std::os::unix::fs::MetadataExt;

	(
		Some(metadata.ino()),
		Some(metadata.dev()),
		Some(metadata.mode()),
	)
}

#[cfg(not(unix))]
fn unix_ids(_metadata: &Metadata) -> (Option<u64>, Option<u64>, Option<u32>) {
	(None, None, None)
}

trait TimestampsExt {
	fn modified_or_now(&self) -> SystemTime;
	fn accessed_or_now(&self) -> SystemTime;
	/// Birth time is missing on a few filesystems, the modification time is the closest we have
	fn created_or_modified(&self) -> SystemTime;
}

impl TimestampsExt for Metadata {
	fn modified_or_now(&self) -> SystemTime {
		self.modified().unwrap_or_else(|_| SystemTime::now())
	}

	fn accessed_or_now(&self) -> SystemTime {
		self.accessed().unwrap_or_else(|_| SystemTime::now())
	}

	fn created_or_modified(&self) -> SystemTime {
		self.created().unwrap_or_else(|_| self.modified_or_now())
	}
}
