//! Readiness of a watched root.
//!
//! Two independent channels feed this machine: the event source finishing its initial scan and the
//! host application finishing its own bootstrap. Only their combination matters to the rest of the
//! crate, so consumers read [`CompositeState`] and never the raw flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether the event source has reported the end of its initial scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WatcherReadiness {
	#[default]
	NotReady,
	Ready,
}

/// Whether the host application has finished its startup phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BootstrapState {
	#[default]
	Pending,
	Finished,
}

/// The mode selector used by the intake and by the logging policy.
///
/// `WatchingReadyBootstrapped` is terminal: once reached, no signal moves away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompositeState {
	#[default]
	WatchingNotReady,
	WatchingReady,
	WatchingReadyBootstrapped,
}

impl CompositeState {
	/// Events for new paths must be buffered instead of synchronized right away.
	#[must_use]
	pub const fn buffers_additions(self) -> bool {
		matches!(self, Self::WatchingNotReady)
	}

	/// Add, change and delete traces are only emitted once the startup flood is over.
	#[must_use]
	pub const fn announces_changes(self) -> bool {
		matches!(self, Self::WatchingReadyBootstrapped)
	}
}

impl fmt::Display for CompositeState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::WatchingNotReady => write!(f, "WATCHING_NOT_READY"),
			Self::WatchingReady => write!(f, "WATCHING_READY"),
			Self::WatchingReadyBootstrapped => write!(f, "WATCHING_READY_BOOTSTRAPPED"),
		}
	}
}

/// Signals accepted by [`Readiness::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
	WatcherReady,
	BootstrapFinished,
}

/// Result of feeding one [`Signal`] to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	pub from: CompositeState,
	pub to: CompositeState,
	/// Set only on the single `NotReady -> Ready` flip of the watcher channel, which can happen
	/// without a composite change when bootstrap finished first.
	pub watcher_became_ready: bool,
}

impl Transition {
	#[must_use]
	pub fn changed(&self) -> bool {
		self.from != self.to
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
	watcher: WatcherReadiness,
	bootstrap: BootstrapState,
}

impl Readiness {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			watcher: WatcherReadiness::NotReady,
			bootstrap: BootstrapState::Pending,
		}
	}

	#[must_use]
	pub const fn watcher(&self) -> WatcherReadiness {
		self.watcher
	}

	#[must_use]
	pub const fn bootstrap(&self) -> BootstrapState {
		self.bootstrap
	}

	#[must_use]
	pub const fn composite(&self) -> CompositeState {
		match (self.watcher, self.bootstrap) {
			(WatcherReadiness::NotReady, BootstrapState::Pending) => {
				CompositeState::WatchingNotReady
			}
			(WatcherReadiness::Ready, BootstrapState::Pending) => CompositeState::WatchingReady,
			(WatcherReadiness::NotReady | WatcherReadiness::Ready, BootstrapState::Finished) => {
				CompositeState::WatchingReadyBootstrapped
			}
		}
	}

	/// Feeds a signal to the machine. Repeated signals are self-loops and never fail.
	pub fn apply(&mut self, signal: Signal) -> Transition {
		let from = self.composite();

		let watcher_became_ready = match signal {
			Signal::WatcherReady => {
				let flipped = self.watcher == WatcherReadiness::NotReady;
				self.watcher = WatcherReadiness::Ready;
				flipped
			}
			Signal::BootstrapFinished => {
				self.bootstrap = BootstrapState::Finished;
				false
			}
		};

		Transition {
			from,
			to: self.composite(),
			watcher_became_ready,
		}
	}
}
