//! bookvault-etl - Book catalog ingest pipeline
//!
//! Discovers CSV files under a source folder, cleans and reconciles their
//! divergent layouts across a worker pool, and rebuilds the BookVault
//! SQLite store with lookup indexes. Each run is a full rebuild.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bookvault_etl::{run_pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "bookvault-etl", about = "Book catalog ingest pipeline", version)]
struct Args {
    /// Source folder containing CSV files
    #[arg(long, default_value = "data/csv")]
    source_dir: PathBuf,

    /// Target database file (defaults to the resolved data folder)
    #[arg(long, env = "BOOKVAULT_DB")]
    db: Option<PathBuf>,

    /// Parallel workers (0 = one per available core)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Write the JSON run summary to this path
    #[arg(long)]
    summary_out: Option<PathBuf>,

    /// Stop taking new chunks after this many seconds; in-flight chunks
    /// finish and the store is finalized with what was committed
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let db_path = args.db.unwrap_or_else(|| {
        let data_folder = bookvault_common::config::resolve_data_folder(None, "BOOKVAULT_DATA_DIR");
        bookvault_common::config::database_path(&data_folder)
    });

    info!("Starting bookvault-etl");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Source: {}", args.source_dir.display());
    info!("Database: {}", db_path.display());

    // Ctrl-C stops new chunks; in-flight chunks finish and the store is
    // finalized with whatever was committed.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested; finishing in-flight chunks");
                cancel.cancel();
            }
        });
    }

    // The run-level timeout uses the same path as external cancellation
    if let Some(secs) = args.timeout_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            warn!("Run timeout of {}s reached; finishing in-flight chunks", secs);
            cancel.cancel();
        });
    }

    let config = PipelineConfig {
        source_folder: args.source_dir,
        db_path,
        worker_count: args.workers,
        summary_out: args.summary_out,
    };

    let summary = run_pipeline(config, cancel).await?;

    info!(
        "Run {}: {} rows scanned, {} accepted, {} rejected, {}/{} files loaded in {} ms",
        summary.state.as_str(),
        summary.rows_scanned,
        summary.rows_accepted,
        summary.rows_rejected,
        summary.files_loaded,
        summary.files_total,
        summary.elapsed_ms
    );

    Ok(())
}
