use crate::{
	config::{IgnoreRules, ValidatedConfig},
	error::Error,
	event::{FsEvent, SourceMessage},
};

use std::path::{Path, PathBuf};

use async_channel as chan;
use notify::{
	event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
	Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::task::{spawn_blocking, JoinHandle};
use tracing::{debug, error, instrument, trace, warn, Span};
use walkdir::WalkDir;

/// What the filesystem says about a path right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
	Missing,
	File,
	Directory,
}

impl Probe {
	fn path(path: &Path) -> Self {
		match std::fs::symlink_metadata(path) {
			Ok(metadata) if metadata.is_dir() => Self::Directory,
			Ok(_) => Self::File,
			Err(_) => Self::Missing,
		}
	}
}

/// Default event source: a recursive `notify` watcher plus an initial scan of the tree.
///
/// The watcher is armed before the scan starts so nothing created mid-scan slips through; the price
/// is that a path may be reported twice, which the store absorbs as the same record id.
#[derive(Debug)]
pub struct FsEventSource {
	root: PathBuf,
	watcher: RecommendedWatcher,
	scan_handle: Option<JoinHandle<()>>,
}

impl FsEventSource {
	#[instrument(skip_all, fields(root = %config.root().display()))]
	pub fn start(
		config: &ValidatedConfig,
		messages_tx: chan::Sender<SourceMessage>,
	) -> Result<Self, Error> {
		let root = config.root().to_path_buf();

		let mut watcher = RecommendedWatcher::new(
			{
				let messages_tx = messages_tx.clone();
				let ignore = config.ignore().clone();
				move |result: notify::Result<Event>| {
					let messages = match result {
						Ok(event) => translate(event, &ignore, Probe::path)
							.into_iter()
							.map(SourceMessage::Event)
							.collect(),
						Err(e) => vec![SourceMessage::Error(e)],
					};

					for msg in messages {
						if messages_tx.is_closed() {
							trace!("Dropping file system event, intake is gone;");
							return;
						}

						// SAFETY: we are not blocking the thread as this is an unbounded channel
						if messages_tx.send_blocking(msg).is_err() {
							error!("Unable to send file system event to the intake;");
						}
					}
				}
			},
			Config::default(),
		)?;

		watcher.watch(&root, RecursiveMode::Recursive)?;
		trace!("Now watching root");

		let scan_handle = spawn_blocking({
			let root = root.clone();
			let ignore = config.ignore().clone();
			let follow_symlinks = config.follow_symlinks();
			let span = Span::current();
			move || {
				let _entered = span.enter();
				initial_scan(&root, &ignore, follow_symlinks, &messages_tx);
			}
		});

		Ok(Self {
			root,
			watcher,
			scan_handle: Some(scan_handle),
		})
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Waits for the initial scan to have emitted everything, `ready` included.
	pub async fn scan_finished(&mut self) {
		if let Some(handle) = self.scan_handle.take() {
			if let Err(e) = handle.await {
				error!(?e, "Initial scan task failed;");
			}
		}
	}

	pub fn unwatch(&mut self) {
		if let Err(e) = self.watcher.unwatch(&self.root) {
			error!(?e, "Unable to unwatch root;");
		} else {
			trace!("Stop watching root");
		}
	}
}

/// Emits `addDir`/`add` for the whole tree, root included, then `ready`.
fn initial_scan(
	root: &Path,
	ignore: &IgnoreRules,
	follow_symlinks: bool,
	messages_tx: &chan::Sender<SourceMessage>,
) {
	let mut discovered = 0_usize;

	for entry in WalkDir::new(root)
		.follow_links(follow_symlinks)
		.into_iter()
		.filter_entry(|entry| !ignore.is_ignored(entry.path()))
	{
		let event = match entry {
			Ok(entry) if entry.file_type().is_dir() => FsEvent::add_dir(entry.into_path()),
			Ok(entry) => FsEvent::add(entry.into_path()),
			Err(e) => {
				warn!(?e, "Skipping unreadable entry during initial scan;");
				continue;
			}
		};

		discovered += 1;

		if messages_tx.send_blocking(event.into()).is_err() {
			debug!("Intake closed during the initial scan;");
			return;
		}
	}

	debug!(%discovered, "Initial scan finished;");

	if messages_tx.send_blocking(SourceMessage::Ready).is_err() {
		debug!("Intake closed before the initial scan was reported ready;");
	}
}

/// Maps a raw `notify` event to our five event kinds, dropping ignored paths.
///
/// Platforms disagree on how much they say about an entry (Windows reports `Create(Any)` for
/// everything), so whenever the kind is ambiguous we ask `probe` what is on disk now.
pub(crate) fn translate(
	event: Event,
	ignore: &IgnoreRules,
	probe: impl Fn(&Path) -> Probe,
) -> Vec<FsEvent> {
	let addition = |path: PathBuf| match probe(&path) {
		Probe::Directory => Some(FsEvent::add_dir(path)),
		Probe::File => Some(FsEvent::add(path)),
		Probe::Missing => None,
	};

	let Event { kind, paths, .. } = event;
	let mut paths = paths.into_iter();

	let events = match kind {
		EventKind::Create(CreateKind::Folder) => paths.map(FsEvent::add_dir).collect(),
		EventKind::Create(CreateKind::File) => paths.map(FsEvent::add).collect(),
		EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
			paths.filter_map(addition).collect()
		}

		EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
			paths.map(FsEvent::unlink).collect()
		}
		EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
			match (paths.next(), paths.next()) {
				(Some(from), Some(to)) => {
					let mut events = vec![FsEvent::unlink(from)];
					events.extend(addition(to));
					events
				}
				(Some(path), None) => vec![FsEvent::unlink(path)],
				_ => vec![],
			}
		}
		// Rename halves without a direction, only the disk knows which side this is
		EventKind::Modify(ModifyKind::Name(_)) => paths
			.map(|path| addition(path.clone()).unwrap_or_else(|| FsEvent::unlink(path)))
			.collect(),

		// Content and metadata changes, directories don't have a change lifecycle
		EventKind::Modify(_) => paths
			.filter(|path| probe(path) == Probe::File)
			.map(FsEvent::change)
			.collect(),

		EventKind::Remove(RemoveKind::Folder) => paths.map(FsEvent::unlink_dir).collect(),
		EventKind::Remove(_) => paths.map(FsEvent::unlink).collect(),

		EventKind::Access(_) | EventKind::Any | EventKind::Other => {
			trace!(?kind, "Ignoring event kind;");
			vec![]
		}
	};

	events
		.into_iter()
		.filter(|event| !ignore.is_ignored(&event.path))
		.collect()
}
