use crate::{
	config::{SyncConfig, ValidatedConfig},
	error::Error,
	event::SourceMessage,
	intake::{EventIntake, InitialSync},
	source::FsEventSource,
	state::CompositeState,
	store::RecordStore,
	synchronizer::Synchronizer,
};

use std::{path::Path, pin::pin, sync::Arc};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use tokio::{spawn, sync::watch, task::JoinHandle};
use tracing::{debug, error, info, instrument, trace, Instrument};

/// Watches one root and keeps a [`RecordStore`] in sync with it.
///
/// Owns the event source and the intake task. Dropping it stops intake without waiting for in-flight
/// synchronizations, use [`RootWatcher::shutdown`] to let them settle.
#[derive(Debug)]
pub struct RootWatcher {
	config: ValidatedConfig,
	source: Option<FsEventSource>,
	bootstrap_tx: chan::Sender<()>,
	stop_tx: chan::Sender<()>,
	state_rx: watch::Receiver<CompositeState>,
	initial_sync: InitialSync,
	handle: Option<JoinHandle<()>>,
}

impl RootWatcher {
	/// Validates `config` and starts watching.
	///
	/// Must be called from within a tokio runtime. Configuration errors are returned before any
	/// watcher exists.
	#[instrument(
		name = "root_watcher",
		skip_all,
		fields(root = %config.root.display(), name = %config.name),
	)]
	pub fn new(config: &SyncConfig, store: Arc<dyn RecordStore>) -> Result<Self, Error> {
		let config = config.validate()?;
		let synchronizer = Arc::new(Synchronizer::from_config(&config, store));

		Self::with_synchronizer(config, synchronizer)
	}

	/// Same as [`RootWatcher::new`] with caller provided collaborators
	#[instrument(
		name = "root_watcher",
		skip_all,
		fields(root = %config.root().display(), name = %config.name()),
	)]
	pub fn with_synchronizer(
		config: ValidatedConfig,
		synchronizer: Arc<Synchronizer>,
	) -> Result<Self, Error> {
		let (messages_tx, messages_rx) = chan::unbounded();
		let (bootstrap_tx, bootstrap_rx) = chan::bounded(1);
		let (stop_tx, stop_rx) = chan::bounded(1);

		let intake = EventIntake::new(synchronizer);
		let state_rx = intake.subscribe_state();
		let initial_sync = intake.initial_sync();

		// Intake must be listening before the source produces anything
		let handle = spawn(
			async move {
				Self::run_intake(intake, messages_rx, bootstrap_rx, stop_rx).await;

				info!("Root watcher gracefully shutdown");
			}
			.in_current_span(),
		);

		let source = match FsEventSource::start(&config, messages_tx) {
			Ok(source) => source,
			Err(e) => {
				handle.abort();
				return Err(e);
			}
		};

		Ok(Self {
			config,
			source: Some(source),
			bootstrap_tx,
			stop_tx,
			state_rx,
			initial_sync,
			handle: Some(handle),
		})
	}

	async fn run_intake(
		mut intake: EventIntake,
		messages_rx: chan::Receiver<SourceMessage>,
		bootstrap_rx: chan::Receiver<()>,
		stop_rx: chan::Receiver<()>,
	) {
		enum StreamMessage {
			Source(SourceMessage),
			BootstrapFinished,
			Stop,
		}

		let mut msg_stream = pin!((
			messages_rx.clone().map(StreamMessage::Source),
			bootstrap_rx.map(|()| StreamMessage::BootstrapFinished),
			stop_rx.map(|()| StreamMessage::Stop),
		)
			.merge());

		while let Some(msg) = msg_stream.next().await {
			match msg {
				StreamMessage::Source(msg) => intake.handle(msg),

				StreamMessage::BootstrapFinished => intake.bootstrap_finished(),

				StreamMessage::Stop => {
					debug!("Stopping root watcher intake;");
					break;
				}
			}
		}

		// Stop may overtake messages the source already sent, they were accepted all the same
		let mut leftovers = 0_usize;
		while let Ok(msg) = messages_rx.try_recv() {
			intake.handle(msg);
			leftovers += 1;
		}

		trace!(
			%leftovers,
			pending = intake.pending(),
			"Waiting for in-flight synchronizations..."
		);
		intake.settle().await;
	}

	/// Tells the watcher the host application finished its own startup.
	///
	/// Idempotent. Changes are announced as info traces from here on, once the watcher is ready.
	pub fn bootstrap_finished(&self) {
		if let Err(chan::TrySendError::Closed(())) = self.bootstrap_tx.try_send(()) {
			error!("Tried to signal bootstrap to a stopped root watcher;");
		}
		// A full channel means a signal is already on its way
	}

	#[must_use]
	pub fn state(&self) -> CompositeState {
		*self.state_rx.borrow()
	}

	#[must_use]
	pub fn subscribe_state(&self) -> watch::Receiver<CompositeState> {
		self.state_rx.clone()
	}

	#[must_use]
	pub fn initial_sync(&self) -> InitialSync {
		self.initial_sync.clone()
	}

	/// Absolute and normalized, event paths are always below it
	#[must_use]
	pub fn root(&self) -> &Path {
		self.config.root()
	}

	#[must_use]
	pub fn config(&self) -> &ValidatedConfig {
		&self.config
	}

	/// Stops the source, then waits for every accepted event to be synchronized.
	///
	/// Everything the source reported before this call is accepted, initial scan included.
	#[instrument(skip_all, fields(root = %self.config.root().display()))]
	pub async fn shutdown(mut self) {
		if let Some(mut source) = self.source.take() {
			source.unwatch();
			source.scan_finished().await;
			// Nothing new gets reported once the source is gone
			drop(source);
		}

		if let Some(handle) = self.handle.take() {
			if self.stop_tx.send(()).await.is_err() {
				debug!("Root watcher intake was already gone;");
			}

			if let Err(e) = handle.await {
				error!(?e, "Failed to join root watcher intake;");
			}
		}
	}
}

impl Drop for RootWatcher {
	fn drop(&mut self) {
		if self.handle.take().is_some() && self.stop_tx.try_send(()).is_err() {
			trace!("Root watcher intake already stopping;");
		}
	}
}
