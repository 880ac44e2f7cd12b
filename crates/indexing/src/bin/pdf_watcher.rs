use anyhow::{Context, Result};
use clap::Parser;
use pdf_meta_common::{init_tracing_with_level, WatchSettings, DEFAULT_COMPANIES_FILE};
use pdf_meta_indexing::IngestionLoop;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "pdf-watcher")]
#[command(about = "Watch a directory and extract metadata from PDF files", long_about = None)]
struct Cli {
    /// Directory to watch for PDF files
    directory: PathBuf,

    /// Path to the companies configuration file
    #[arg(short, long, default_value = DEFAULT_COMPANIES_FILE)]
    companies: PathBuf,

    /// Tolerance for x-distance to insert spaces
    #[arg(short = 'x', long = "x-tolerance", alias = "x_tolerance", default_value_t = 1.0)]
    x_tolerance: f64,

    /// Settle delay in milliseconds before a new or changed file is read
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Load the previous .meta file and reconcile it instead of starting fresh
    #[arg(long)]
    load_existing: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(&cli.log_level)?;

    let settings = WatchSettings {
        directory: cli.directory,
        companies_path: cli.companies,
        x_tolerance: cli.x_tolerance,
        settle: Duration::from_millis(cli.settle_ms),
        load_existing: cli.load_existing,
    };
    debug!("Settings: {:#?}", settings);

    let mut ingest = IngestionLoop::from_settings(settings).context("startup failed")?;

    ingest
        .reconcile()
        .await
        .context("failed to scan existing PDF files")?;

    info!("👁️  Watching directory: {}", ingest.directory().display());
    info!("📋 Meta file: {}", ingest.store().index_path().display());
    info!("Press Ctrl+C to stop...");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            info!("🛑 Stopping watcher...");
            shutdown.cancel();
        }
    });

    let store = ingest.watch(shutdown).await?;
    info!("✓ Watcher stopped ({} entries tracked)", store.len());
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Could not install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
