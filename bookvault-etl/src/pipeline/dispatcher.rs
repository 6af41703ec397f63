//! Worker pool dispatcher
//!
//! Partitions the discovered CSV files into chunks (one chunk per file)
//! and fans them out to a fixed pool of blocking workers. Each worker
//! independently parses, normalizes and cleans its chunk and delivers one
//! batch over the channel; batches arrive at the loader in whatever order
//! workers finish. Workers share nothing but the chunk queue and the
//! channel sender.

use crate::clean::{clean_record, CleanOutcome, RejectReason};
use crate::models::{Batch, BatchSummary};
use crate::schema::{AliasTable, SchemaNormalizer};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One unit of work: a single source file
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Absolute path to the CSV file
    pub path: PathBuf,
    /// Path relative to the source folder, used in reports
    pub source_file: String,
}

/// Message from a worker to the loader
#[derive(Debug)]
pub enum WorkerMessage {
    /// A cleaned chunk, ready for bulk insert
    Batch(Batch),
    /// The chunk's file could not be opened or read at all
    ChunkFailed { source_file: String, error: String },
}

/// Default worker count: available cores, minimum 1
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Spawn the worker pool over the given chunks
///
/// Returns the receiving end of the batch channel; it closes once every
/// worker has drained the queue (or stopped taking new chunks after
/// cancellation; in-flight chunks always run to completion).
pub fn spawn_workers(
    chunks: Vec<Chunk>,
    alias_table: Arc<AliasTable>,
    worker_count: usize,
    cancel: CancellationToken,
) -> mpsc::Receiver<WorkerMessage> {
    let worker_count = worker_count.max(1);
    let (tx, rx) = mpsc::channel(worker_count * 2);
    let queue = Arc::new(Mutex::new(VecDeque::from(chunks)));

    for worker_id in 0..worker_count {
        let queue = queue.clone();
        let tx = tx.clone();
        let alias_table = alias_table.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            debug!(worker_id, "Worker started");

            loop {
                if cancel.is_cancelled() {
                    debug!(worker_id, "Cancellation requested, not taking new chunks");
                    break;
                }

                let chunk = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(_) => break,
                };

                let Some(chunk) = chunk else { break };

                let message = process_chunk(&chunk, &alias_table);

                if tx.blocking_send(message).is_err() {
                    // Loader went away; nothing left to deliver to
                    break;
                }
            }

            debug!(worker_id, "Worker finished");
        });
    }

    // Workers own the only senders; rx closes when the last one exits
    rx
}

/// Parse, normalize and clean one chunk
///
/// Malformed rows are tallied, never fatal. Only a file that cannot be
/// opened (or whose header cannot be read) fails the whole chunk.
pub fn process_chunk(chunk: &Chunk, alias_table: &AliasTable) -> WorkerMessage {
    let mut reader = match csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&chunk.path)
    {
        Ok(reader) => reader,
        Err(e) => {
            warn!(file = %chunk.source_file, error = %e, "Failed to open chunk");
            return WorkerMessage::ChunkFailed {
                source_file: chunk.source_file.clone(),
                error: e.to_string(),
            };
        }
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(file = %chunk.source_file, error = %e, "Failed to read header row");
            return WorkerMessage::ChunkFailed {
                source_file: chunk.source_file.clone(),
                error: e.to_string(),
            };
        }
    };

    let normalizer = SchemaNormalizer::for_headers(alias_table, &headers);

    let mut records = Vec::new();
    let mut summary = BatchSummary::new(chunk.source_file.clone());

    for row in reader.records() {
        match row {
            Ok(row) => {
                let values = normalizer.normalize(&row);
                match clean_record(&values) {
                    CleanOutcome::Accepted(record) => {
                        summary.record_accepted();
                        records.push(record);
                    }
                    CleanOutcome::Rejected(reason) => {
                        summary.record_rejected(reason);
                    }
                }
            }
            Err(e) => {
                debug!(file = %chunk.source_file, error = %e, "Skipping malformed row");
                summary.record_rejected(RejectReason::MalformedRow);
            }
        }
    }

    debug!(
        file = %chunk.source_file,
        rows_read = summary.rows_read,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "Chunk cleaned"
    );

    WorkerMessage::Batch(Batch { records, summary })
}

/// Build chunks from discovered files, one per file
pub fn make_chunks(files: &[PathBuf], source_root: &Path) -> Vec<Chunk> {
    files
        .iter()
        .map(|path| Chunk {
            path: path.clone(),
            source_file: path
                .strip_prefix(source_root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string(),
        })
        .collect()
}
