use crate::{
	error::Error,
	event::{FsEvent, FsEventKind, SourceMessage},
	queue::PendingQueue,
	state::{CompositeState, Readiness, Signal},
	synchronizer::Synchronizer,
};

use std::sync::Arc;

use futures_concurrency::future::Join;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, error, info, trace, Instrument};

/// Outcome of draining the paths buffered during the initial scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrainSummary {
	pub queued: usize,
	pub synced: usize,
	pub failed: usize,
}

/// Resolves once every path queued before the watcher was ready is represented in the store (or
/// reported as failed).
#[derive(Debug, Clone)]
pub struct InitialSync {
	rx: watch::Receiver<Option<DrainSummary>>,
}

impl InitialSync {
	pub async fn wait(mut self) -> Result<DrainSummary, Error> {
		let summary = *self
			.rx
			.wait_for(Option::is_some)
			.await
			.map_err(|_| Error::InitialSyncDropped)?;

		summary.ok_or(Error::InitialSyncDropped)
	}

	#[must_use]
	pub fn try_get(&self) -> Option<DrainSummary> {
		*self.rx.borrow()
	}
}

/// Decides, event by event, whether to buffer or to synchronize right away.
///
/// The decision itself is synchronous and cheap; synchronization runs on spawned tasks so a slow
/// materialization never holds up intake, including while the initial queue drains.
#[derive(Debug)]
pub struct EventIntake {
	readiness: Readiness,
	queue: PendingQueue,
	synchronizer: Arc<Synchronizer>,
	in_flight: JoinSet<()>,
	state_tx: watch::Sender<CompositeState>,
	initial_sync_tx: Arc<watch::Sender<Option<DrainSummary>>>,
}

impl EventIntake {
	#[must_use]
	pub fn new(synchronizer: Arc<Synchronizer>) -> Self {
		let readiness = Readiness::new();
		let (state_tx, _) = watch::channel(readiness.composite());
		let (initial_sync_tx, _) = watch::channel(None);

		Self {
			readiness,
			queue: PendingQueue::new(),
			synchronizer,
			in_flight: JoinSet::new(),
			state_tx,
			initial_sync_tx: Arc::new(initial_sync_tx),
		}
	}

	#[must_use]
	pub const fn state(&self) -> CompositeState {
		self.readiness.composite()
	}

	#[must_use]
	pub fn subscribe_state(&self) -> watch::Receiver<CompositeState> {
		self.state_tx.subscribe()
	}

	#[must_use]
	pub fn initial_sync(&self) -> InitialSync {
		InitialSync {
			rx: self.initial_sync_tx.subscribe(),
		}
	}

	/// Number of paths still waiting for the watcher to be ready
	#[must_use]
	pub fn pending(&self) -> usize {
		self.queue.len()
	}

	pub fn handle(&mut self, msg: SourceMessage) {
		match msg {
			SourceMessage::Event(event) => self.handle_event(event),
			SourceMessage::Ready => self.watcher_ready(),
			SourceMessage::Error(e) => error!(?e, "Watcher error;"),
		}

		self.reap();
	}

	pub fn handle_event(&mut self, event: FsEvent) {
		let state = self.readiness.composite();

		let event = if event.kind.is_addition() && state.buffers_additions() {
			match self.queue.push(event) {
				Ok(()) => {
					trace!(pending = self.queue.len(), "Queued addition until the watcher is ready;");
					return;
				}
				Err(event) => event,
			}
		} else {
			event
		};

		if event.kind.is_removal() && !self.queue.is_drained() {
			// A queued addition must not resurrect what was just removed
			let discarded = self
				.queue
				.discard(&event.path, event.kind == FsEventKind::UnlinkDir);
			if discarded > 0 {
				debug!(
					path = %event.path.display(),
					%discarded,
					"Removal superseded queued paths;"
				);
			}
		}

		let synchronizer = Arc::clone(&self.synchronizer);
		self.in_flight.spawn(
			async move {
				synchronizer
					.apply_and_report(&event, state.announces_changes())
					.await;
			}
			.in_current_span(),
		);
	}

	pub fn watcher_ready(&mut self) {
		self.signal(Signal::WatcherReady);
	}

	pub fn bootstrap_finished(&mut self) {
		self.signal(Signal::BootstrapFinished);
	}

	fn signal(&mut self, signal: Signal) {
		let transition = self.readiness.apply(signal);

		if transition.changed() {
			debug!(from = %transition.from, to = %transition.to, "Readiness changed;");
			self.state_tx.send_replace(transition.to);
		} else {
			trace!(?signal, state = %transition.to, "Repeated readiness signal;");
		}

		if transition.watcher_became_ready {
			self.drain();
		}
	}

	/// Takes the queue snapshot and synchronizes it on a separate task.
	///
	/// Events inside the snapshot are synchronized concurrently; the initial sync resolves only after
	/// all of them settled. The snapshot is the startup flood and is never announced, even when the
	/// host bootstrapped before the watcher was ready.
	fn drain(&mut self) {
		let Some(snapshot) = self.queue.take() else {
			return;
		};

		debug!(queued = snapshot.len(), "Draining paths found by the initial scan;");

		let synchronizer = Arc::clone(&self.synchronizer);
		let initial_sync_tx = Arc::clone(&self.initial_sync_tx);

		self.in_flight.spawn(
			async move {
				let queued = snapshot.len();

				let synced = snapshot
					.into_iter()
					.map(|event| {
						let synchronizer = &synchronizer;
						async move { synchronizer.apply_and_report(&event, false).await }
					})
					.collect::<Vec<_>>()
					.join()
					.await
					.into_iter()
					.filter(|synced| *synced)
					.count();

				let summary = DrainSummary {
					queued,
					synced,
					failed: queued - synced,
				};

				info!(
					queued = summary.queued,
					synced = summary.synced,
					failed = summary.failed,
					"Initial synchronization settled;"
				);

				initial_sync_tx.send_replace(Some(summary));
			}
			.in_current_span(),
		);
	}

	fn reap(&mut self) {
		while let Some(res) = self.in_flight.try_join_next() {
			if let Err(e) = res {
				error!(?e, "Synchronization task failed;");
			}
		}
	}

	/// Waits for every accepted event to finish, there is no cancellation of in-flight work.
	pub async fn settle(&mut self) {
		while let Some(res) = self.in_flight.join_next().await {
			if let Err(e) = res {
				error!(?e, "Synchronization task failed;");
			}
		}
	}
}
