//! qalert-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one of:
//!
//! - `serve` (default): the HTTP API plus the monitoring scheduler.
//! - `import-zeroing <file.json>`: upsert a JSON array of quality-zeroing
//!   records.
//! - `scan-once`: run a single monitoring pass and print its summary.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use qalert_core::{clock::SystemClock, zeroing::QualityZeroingRecord};
use qalert_server::{ServerConfig, app, load_config, wire};
use qalert_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Quality alert engine server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API and run the monitoring scheduler.
  Serve,
  /// Load quality-zeroing records from a JSON array file.
  ImportZeroing { file: PathBuf },
  /// Run one monitoring pass and print the summary as JSON.
  ScanOnce,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let store = Arc::new(store);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(cfg, store).await,
    Command::ImportZeroing { file } => import_zeroing(&store, file).await,
    Command::ScanOnce => {
      let services = wire(store, Arc::new(SystemClock), cfg.scheduler.options());
      let summary = services.scheduler.run_once().await?;
      println!("{}", serde_json::to_string_pretty(&summary)?);
      Ok(())
    }
  }
}

async fn serve(cfg: ServerConfig, store: Arc<SqliteStore>) -> anyhow::Result<()> {
  let services = wire(store, Arc::new(SystemClock), cfg.scheduler.options());
  if cfg.scheduler.enabled {
    services.scheduler.start();
  }

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(services.state))
    .with_graceful_shutdown(wait_for_shutdown_signal())
    .await
    .context("server error")?;

  services.scheduler.stop().await;
  Ok(())
}

async fn import_zeroing(store: &SqliteStore, file: PathBuf) -> anyhow::Result<()> {
  let raw = tokio::fs::read_to_string(&file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let records: Vec<QualityZeroingRecord> =
    serde_json::from_str(&raw).with_context(|| format!("invalid zeroing records in {file:?}"))?;

  for record in &records {
    store
      .upsert_zeroing(record)
      .await
      .with_context(|| format!("failed to store zeroing record {}", record.zeroing_id))?;
  }
  tracing::info!(count = records.len(), "imported quality-zeroing records");
  Ok(())
}

/// Resolve on SIGTERM or SIGINT (ctrl-c elsewhere).
async fn wait_for_shutdown_signal() {
  #[cfg(unix)]
  {
    use tokio::signal::unix::{SignalKind, signal};
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
      (Ok(mut sigterm), Ok(mut sigint)) => {
        tokio::select! {
          _ = sigterm.recv() => {}
          _ = sigint.recv() => {}
        }
      }
      _ => {
        tracing::warn!("failed to register signal handlers, waiting for ctrl-c");
        let _ = tokio::signal::ctrl_c().await;
      }
    }
  }
  #[cfg(not(unix))]
  {
    let _ = tokio::signal::ctrl_c().await;
  }
  tracing::info!("shutdown signal received");
}
