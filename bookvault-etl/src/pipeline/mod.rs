//! Pipeline orchestration
//!
//! Wires discovery, the worker pool and the loader together for one full
//! rebuild of the store. The loader side of this module is the only code
//! that touches the database write path; workers only ever hand it batches
//! through the channel.

pub mod dispatcher;
pub mod loader;

use crate::db;
use crate::discover::CsvDiscovery;
use crate::error::EtlError;
use crate::models::{LoadRun, LoadState, RunSummary};
use crate::pipeline::dispatcher::{make_chunks, spawn_workers, Chunk, WorkerMessage};
use crate::schema::AliasTable;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bookvault_common::db::init_database;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Folder holding the source CSV files (read-only input)
    pub source_folder: PathBuf,
    /// Target database file (rebuilt from scratch each run)
    pub db_path: PathBuf,
    /// Worker count; 0 means one per available core
    pub worker_count: usize,
    /// Optional path for the JSON run summary
    pub summary_out: Option<PathBuf>,
}

/// Execute one full load run
///
/// Returns the run summary on success (including a cancelled-but-finalized
/// run). Fatal conditions (unreadable source folder, no input files, an
/// unwritable store, every chunk failing) surface as `EtlError` and leave
/// the run row in a failed state with no indexes built.
pub async fn run_pipeline(
    config: PipelineConfig,
    cancel: CancellationToken,
) -> Result<RunSummary, EtlError> {
    let files = CsvDiscovery::new().scan(&config.source_folder)?;
    if files.is_empty() {
        return Err(EtlError::NoSourceFiles(
            config.source_folder.display().to_string(),
        ));
    }

    let worker_count = if config.worker_count == 0 {
        dispatcher::default_worker_count()
    } else {
        config.worker_count
    };

    let chunks = make_chunks(&files, &config.source_folder);

    let pool = init_database(&config.db_path).await?;

    let result = execute_run(&pool, &config, chunks, worker_count, cancel).await;

    // Clean close checkpoints the WAL so any reader sees the full store,
    // whether the run succeeded or not.
    pool.close().await;

    let summary = result?;

    if let Some(path) = &config.summary_out {
        let json = serde_json::to_string_pretty(&summary).map_err(|e| {
            EtlError::Store(bookvault_common::Error::Internal(format!(
                "Summary serialization failed: {}",
                e
            )))
        })?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Run summary written");
    }

    Ok(summary)
}

/// Run the dispatcher and loader against an open store
async fn execute_run(
    pool: &SqlitePool,
    config: &PipelineConfig,
    chunks: Vec<Chunk>,
    worker_count: usize,
    cancel: CancellationToken,
) -> Result<RunSummary, EtlError> {
    let source_files: Vec<String> = chunks.iter().map(|c| c.source_file.clone()).collect();

    let mut run = LoadRun::new(
        config.source_folder.display().to_string(),
        worker_count,
        &source_files,
    );
    db::save_run(pool, &run).await?;

    info!(
        run_id = %run.run_id,
        files = source_files.len(),
        worker_count,
        "Starting load run"
    );

    run.transition_to(LoadState::Loading);
    db::save_run(pool, &run).await?;

    let alias_table = Arc::new(AliasTable::with_defaults());
    let mut rx = spawn_workers(chunks, alias_table, worker_count, cancel.clone());

    // Single logical writer: batches are consumed serially in arrival
    // order, whichever worker finishes first.
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Batch(batch) => {
                let inserted = match loader::insert_batch(pool, &batch.records).await {
                    Ok(inserted) => inserted,
                    Err(e) => {
                        error!(
                            run_id = %run.run_id,
                            file = %batch.summary.source_file,
                            error = %e,
                            "Bulk insert failed; aborting run"
                        );
                        run.transition_to(LoadState::Failed);
                        db::save_run(pool, &run).await?;
                        return Err(EtlError::Store(e));
                    }
                };

                run.apply_batch(&batch.summary, inserted);
                db::save_run(pool, &run).await?;

                info!(
                    run_id = %run.run_id,
                    file = %batch.summary.source_file,
                    rows_read = batch.summary.rows_read,
                    inserted,
                    rejected = batch.summary.rejected,
                    "Batch loaded"
                );
            }
            WorkerMessage::ChunkFailed { source_file, error } => {
                warn!(
                    run_id = %run.run_id,
                    file = %source_file,
                    error = %error,
                    "Chunk failed; continuing with remaining chunks"
                );
                run.mark_file_failed(&source_file, error);
                db::save_run(pool, &run).await?;
            }
        }
    }

    // Every attempted file failed and nothing was loaded: fatal, and the
    // store must not look complete, so no index build.
    if run.files_failed() == run.files_total() {
        let failed = run.files_failed();
        error!(run_id = %run.run_id, failed, "All chunks failed; run is fatal");
        run.transition_to(LoadState::Failed);
        db::save_run(pool, &run).await?;
        return Err(EtlError::AllChunksFailed(failed));
    }

    // A cancelled run still gets indexed: finalize what was committed
    // rather than leaving the store half-built.
    let cancelled = cancel.is_cancelled();

    run.transition_to(LoadState::Indexing);
    db::save_run(pool, &run).await?;

    if let Err(e) = loader::build_indexes(pool).await {
        error!(run_id = %run.run_id, error = %e, "Index build failed");
        run.transition_to(LoadState::Failed);
        db::save_run(pool, &run).await?;
        return Err(EtlError::Store(e));
    }

    run.transition_to(if cancelled {
        LoadState::Cancelled
    } else {
        LoadState::Completed
    });
    db::save_run(pool, &run).await?;

    let summary = run.to_summary();

    info!(
        run_id = %run.run_id,
        state = run.state.as_str(),
        rows_scanned = summary.rows_scanned,
        rows_accepted = summary.rows_accepted,
        rows_rejected = summary.rows_rejected,
        files_failed = summary.files_failed,
        elapsed_ms = summary.elapsed_ms,
        "Load run finished"
    );

    Ok(summary)
}
