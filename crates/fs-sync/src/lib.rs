//!
//! # File System Sync
//!
//! Keeps a record store in sync with a watched directory tree.
//!
//! A watcher first scans the whole tree, then reports live changes. Paths found by the scan are
//! buffered and synchronized in one batch once the watcher says it is ready, while removals and
//! changes go straight through. Independently, the host application tells us when its own startup
//! is over; from then on (and once the watcher is ready) every change is announced as an info trace.
//!
//! Records are identified by a name-based UUID of their path, so the same path always maps to the
//! same record and duplicate events collapse into updates.
//!
//! ## Basic example
//!
//! ```no_run
//! use sd_fs_sync::{InMemoryRecordStore, RootWatcher, SyncConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sd_fs_sync::Error> {
//!     let store = Arc::new(InMemoryRecordStore::new());
//!
//!     let watcher = RootWatcher::new(
//!         &SyncConfig::new("./content").with_ignore(["**/*.tmp"]),
//!         store.clone(),
//!     )?;
//!
//!     let summary = watcher.initial_sync().wait().await?;
//!     println!("{} records after the initial scan", summary.synced);
//!
//!     watcher.bootstrap_finished();
//!
//!     watcher.shutdown().await;
//!
//!     Ok(())
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod error;
mod event;
mod identifier;
mod intake;
mod queue;
mod record;
mod source;
mod state;
mod store;
mod synchronizer;
mod watcher;

pub use config::{
	IgnoreRules, SyncConfig, ValidatedConfig, DEFAULT_IGNORE_GLOBS, DEFAULT_SOURCE_NAME,
};
pub use error::{report, Error, MaterializeError, StoreError};
pub use event::{FsEvent, FsEventKind, SourceMessage};
pub use identifier::{NamespacedIdentifier, PathIdentifier, RecordId};
pub use intake::{DrainSummary, EventIntake, InitialSync};
pub use queue::PendingQueue;
pub use record::{FsMaterializer, Materializer, Record, RecordKind};
pub use source::FsEventSource;
pub use state::{BootstrapState, CompositeState, Readiness, Signal, Transition, WatcherReadiness};
pub use store::{InMemoryRecordStore, RecordStore, StoreChange, UpsertOutcome};
pub use synchronizer::Synchronizer;
pub use watcher::RootWatcher;
