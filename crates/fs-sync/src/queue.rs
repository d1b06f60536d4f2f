use crate::{event::FsEvent, identifier::canonical_key};

use std::path::Path;

/// Additions discovered before the watcher finished its initial scan.
///
/// Appended to in arrival order, then taken exactly once. After [`PendingQueue::take`] the queue is
/// gone for good: pushes are refused and the caller must synchronize the event itself.
///
/// Only the intake owns it, every access goes through `&mut self`.
#[derive(Debug)]
pub struct PendingQueue {
	events: Option<Vec<FsEvent>>,
}

impl Default for PendingQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl PendingQueue {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			events: Some(Vec::new()),
		}
	}

	/// Hands the event back if the queue was already drained, it is then left to the caller.
	pub fn push(&mut self, event: FsEvent) -> Result<(), FsEvent> {
		match self.events.as_mut() {
			Some(events) => {
				events.push(event);
				Ok(())
			}
			None => Err(event),
		}
	}

	/// Drops queued events superseded by a removal of `removed`, recursively for directories.
	///
	/// Paths are compared the way records are identified, so any spelling of the same path matches.
	pub fn discard(&mut self, removed: &Path, recursive: bool) -> usize {
		let Some(events) = self.events.as_mut() else {
			return 0;
		};

		let removed = canonical_key(removed);

		let before = events.len();
		events.retain(|event| {
			let queued = canonical_key(&event.path);
			if recursive {
				!queued.starts_with(&removed)
			} else {
				queued != removed
			}
		});

		before - events.len()
	}

	/// Swaps the buffer out, leaving the queue permanently drained.
	pub fn take(&mut self) -> Option<Vec<FsEvent>> {
		self.events.take()
	}

	#[must_use]
	pub const fn is_drained(&self) -> bool {
		self.events.is_none()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.events.as_ref().map_or(0, Vec::len)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_arrival_order_and_kind() {
		let mut queue = PendingQueue::new();
		queue.push(FsEvent::add("/r/b.txt")).unwrap();
		queue.push(FsEvent::add_dir("/r/sub")).unwrap();

		assert_eq!(
			queue.take(),
			Some(vec![FsEvent::add("/r/b.txt"), FsEvent::add_dir("/r/sub")])
		);
	}

	#[test]
	fn drains_exactly_once() {
		let mut queue = PendingQueue::new();
		queue.push(FsEvent::add("/r/a.txt")).unwrap();

		assert_eq!(queue.take().map(|events| events.len()), Some(1));
		assert!(queue.is_drained());
		assert_eq!(queue.take(), None);

		assert_eq!(
			queue.push(FsEvent::add("/r/late.txt")),
			Err(FsEvent::add("/r/late.txt"))
		);
		assert!(queue.is_empty());
	}

	#[test]
	fn discard_file_only_matches_exact_path() {
		let mut queue = PendingQueue::new();
		queue.push(FsEvent::add("/r/a.txt")).unwrap();
		queue.push(FsEvent::add("/r/a.txt.bak")).unwrap();
		queue.push(FsEvent::add("/r/a.txt")).unwrap();

		assert_eq!(queue.discard(Path::new("/r/a.txt"), false), 2);
		assert_eq!(queue.take(), Some(vec![FsEvent::add("/r/a.txt.bak")]));
	}

	#[test]
	fn discard_directory_is_recursive() {
		let mut queue = PendingQueue::new();
		queue.push(FsEvent::add_dir("/r/sub")).unwrap();
		queue.push(FsEvent::add("/r/sub/a.txt")).unwrap();
		queue.push(FsEvent::add("/r/subway.txt")).unwrap();

		assert_eq!(queue.discard(Path::new("/r/sub"), true), 2);
		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn discard_matches_other_spellings_of_the_same_path() {
		let mut queue = PendingQueue::new();
		queue.push(FsEvent::add("/r/sub/a.txt")).unwrap();
		queue.push(FsEvent::add("/r/sub/b.txt")).unwrap();

		assert_eq!(queue.discard(Path::new("/r//sub/./a.txt"), false), 1);
		assert_eq!(queue.discard(Path::new("/r/./sub/"), true), 1);
		assert!(queue.is_empty());
	}

	#[cfg(windows)]
	#[test]
	fn discard_ignores_case_where_the_platform_does() {
		let mut queue = PendingQueue::new();
		queue.push(FsEvent::add(r"C:\r\Sub\A.txt")).unwrap();

		assert_eq!(queue.discard(Path::new(r"c:\r\sub\a.TXT"), false), 1);
	}
}
