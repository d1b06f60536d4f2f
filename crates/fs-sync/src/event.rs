use std::{fmt, path::PathBuf};

/// Kinds of filesystem events delivered by an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
	Add,
	AddDir,
	Change,
	Unlink,
	UnlinkDir,
}

impl FsEventKind {
	/// Additions are the only events buffered while the initial scan is running
	#[must_use]
	pub const fn is_addition(self) -> bool {
		matches!(self, Self::Add | Self::AddDir)
	}

	#[must_use]
	pub const fn is_removal(self) -> bool {
		matches!(self, Self::Unlink | Self::UnlinkDir)
	}

	const fn describe(self) -> &'static str {
		match self {
			Self::Add => "added file",
			Self::AddDir => "added directory",
			Self::Change => "changed file",
			Self::Unlink => "file deleted",
			Self::UnlinkDir => "directory deleted",
		}
	}
}

impl fmt::Display for FsEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.describe())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsEvent {
	pub kind: FsEventKind,
	pub path: PathBuf,
}

impl FsEvent {
	pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
		Self {
			kind,
			path: path.into(),
		}
	}

	pub fn add(path: impl Into<PathBuf>) -> Self {
		Self::new(FsEventKind::Add, path)
	}

	pub fn add_dir(path: impl Into<PathBuf>) -> Self {
		Self::new(FsEventKind::AddDir, path)
	}

	pub fn change(path: impl Into<PathBuf>) -> Self {
		Self::new(FsEventKind::Change, path)
	}

	pub fn unlink(path: impl Into<PathBuf>) -> Self {
		Self::new(FsEventKind::Unlink, path)
	}

	pub fn unlink_dir(path: impl Into<PathBuf>) -> Self {
		Self::new(FsEventKind::UnlinkDir, path)
	}
}

impl fmt::Display for FsEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} at {}", self.kind, self.path.display())
	}
}

/// Everything an event source can tell the intake
#[derive(Debug)]
pub enum SourceMessage {
	Event(FsEvent),
	/// The initial scan is over; may be repeated by some sources
	Ready,
	Error(notify::Error),
}

impl From<FsEvent> for SourceMessage {
	fn from(event: FsEvent) -> Self {
		Self::Event(event)
	}
}
