use sd_fs_sync::{InMemoryRecordStore, RecordKind, RootWatcher, StoreChange, SyncConfig};

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::{
	signal,
	sync::broadcast::{self, error::RecvError},
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
	Human,
	Json,
}

#[derive(Parser, Debug)]
#[command(
	name = "sd-fs-sync",
	about = "Watches a directory and mirrors its entries into a record store"
)]
struct Cli {
	/// Directory to watch
	#[arg(env = "SD_FS_SYNC_ROOT")]
	root: Option<PathBuf>,

	/// JSON file with a sync configuration, flags take precedence over it
	#[arg(long)]
	config: Option<PathBuf>,

	/// Source name stamped on every record
	#[arg(long)]
	name: Option<String>,

	/// Extra glob to ignore, may be repeated
	#[arg(long = "ignore", value_name = "GLOB")]
	ignore: Vec<String>,

	/// Follow symbolic links during the initial scan
	#[arg(long, default_value_t = false)]
	follow_symlinks: bool,

	/// Output format for store changes
	#[arg(long, value_enum, default_value = "human")]
	format: OutputFormat,
}

impl Cli {
	fn sync_config(&self) -> Result<SyncConfig> {
		let mut config = match (&self.config, &self.root) {
			(Some(file), _) => {
				let contents = fs::read_to_string(file)
					.with_context(|| format!("unable to read config file {}", file.display()))?;

				serde_json::from_str::<SyncConfig>(&contents)
					.with_context(|| format!("invalid config file {}", file.display()))?
			}
			(None, Some(root)) => SyncConfig::new(root),
			(None, None) => bail!("no root to watch, pass one or set SD_FS_SYNC_ROOT"),
		};

		if let Some(root) = &self.root {
			config.root.clone_from(root);
		}

		if let Some(name) = &self.name {
			config.name.clone_from(name);
		}

		if self.follow_symlinks {
			config.follow_symlinks = true;
		}

		Ok(config.with_ignore(self.ignore.iter().cloned()))
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(fmt::layer().with_writer(std::io::stderr))
		.init();

	let cli = Cli::parse();
	let config = cli.sync_config()?;

	let store = Arc::new(InMemoryRecordStore::new());
	let printer = tokio::spawn(print_changes(store.subscribe(), cli.format));

	let watcher = RootWatcher::new(&config, store.clone()).with_context(|| {
		format!(
			"unable to start watching {}",
			config.root.as_path().display()
		)
	})?;

	let summary = watcher.initial_sync().wait().await?;
	info!(
		root = %watcher.root().display(),
		queued = summary.queued,
		synced = summary.synced,
		failed = summary.failed,
		"Initial synchronization done;"
	);

	// Nothing else to bootstrap in this host
	watcher.bootstrap_finished();

	shutdown_signal().await;

	watcher.shutdown().await;
	drop(store);

	if let Err(e) = printer.await {
		error!(?e, "Change printer failed;");
	}

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(?e, "Failed to listen for Ctrl+C;");
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut terminate) => {
				terminate.recv().await;
			}
			Err(e) => {
				error!(?e, "Failed to install SIGTERM handler;");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
		() = terminate => info!("Received SIGTERM, shutting down gracefully..."),
	}
}

async fn print_changes(mut changes: broadcast::Receiver<StoreChange>, format: OutputFormat) {
	loop {
		match changes.recv().await {
			Ok(change) => print_change(&change, format),
			Err(RecvError::Lagged(skipped)) => warn!(%skipped, "Store changes were dropped;"),
			Err(RecvError::Closed) => break,
		}
	}
}

fn print_change(change: &StoreChange, format: OutputFormat) {
	let action = match change {
		StoreChange::Created(_) => "created",
		StoreChange::Updated(_) => "updated",
		StoreChange::Deleted(_) => "deleted",
	};
	let record = change.record();

	match format {
		OutputFormat::Human => {
			let kind = match record.kind {
				RecordKind::File => format!("file, {} bytes", record.size),
				RecordKind::Directory => "directory".to_string(),
				RecordKind::Symlink => "symlink".to_string(),
			};

			println!(
				"{action:<8} {} ({kind}) {}",
				record.relative_path.display(),
				record.id
			);
		}

		OutputFormat::Json => {
			match serde_json::to_string(&serde_json::json!({ "change": action, "record": record }))
			{
				Ok(line) => println!("{line}"),
				Err(e) => error!(?e, "Failed to serialize store change;"),
			}
		}
	}
}
