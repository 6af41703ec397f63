//! Load run state machine and run summary
//!
//! A load run progresses through:
//! DISCOVERING → LOADING → INDEXING → COMPLETED
//! with CANCELLED and FAILED as the other terminal states. The run
//! structure is mutated only by the loader as batches arrive; workers
//! report through the batch channel, never through shared memory.

use crate::clean::RejectReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use bookvault_common::db::BookRecord;

/// Load run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadState {
    /// Source folder traversal, CSV discovery
    Discovering,
    /// Workers parsing and cleaning, loader writing batches
    Loading,
    /// Bulk writes done, building indexes
    Indexing,
    /// Run finished, store finalized
    Completed,
    /// Run cancelled; whatever was committed has been indexed
    Cancelled,
    /// Run failed; store must not be treated as complete
    Failed,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Discovering => "discovering",
            LoadState::Loading => "loading",
            LoadState::Indexing => "indexing",
            LoadState::Completed => "completed",
            LoadState::Cancelled => "cancelled",
            LoadState::Failed => "failed",
        }
    }
}

/// Per-source-file outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Not yet picked up by a worker (or skipped after cancellation)
    Pending,
    /// Parsed and delivered; counts are per-row for this file
    Loaded {
        rows_read: u64,
        accepted: u64,
        rejected: u64,
    },
    /// File could not be opened or read at all
    Failed { error: String },
}

/// Per-batch validity summary produced by one worker for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Source file this chunk came from (relative to the source folder)
    pub source_file: String,
    pub rows_read: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Rejection counts keyed by reason
    pub reasons: BTreeMap<RejectReason, u64>,
}

impl BatchSummary {
    pub fn new(source_file: String) -> Self {
        Self {
            source_file,
            rows_read: 0,
            accepted: 0,
            rejected: 0,
            reasons: BTreeMap::new(),
        }
    }

    pub fn record_accepted(&mut self) {
        self.rows_read += 1;
        self.accepted += 1;
    }

    pub fn record_rejected(&mut self, reason: RejectReason) {
        self.rows_read += 1;
        self.rejected += 1;
        *self.reasons.entry(reason).or_insert(0) += 1;
    }
}

/// One cleaned chunk, handed from a worker to the loader exactly once
#[derive(Debug, Clone)]
pub struct Batch {
    pub records: Vec<BookRecord>,
    pub summary: BatchSummary,
}

/// One pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRun {
    pub run_id: Uuid,
    pub state: LoadState,
    pub source_folder: String,
    pub worker_count: usize,
    /// Per-file status, keyed by path relative to the source folder
    pub files: BTreeMap<String, FileStatus>,
    pub rows_scanned: u64,
    pub rows_accepted: u64,
    pub rows_rejected: u64,
    pub reasons: BTreeMap<RejectReason, u64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl LoadRun {
    /// Create a new run over the discovered source files
    pub fn new(source_folder: String, worker_count: usize, source_files: &[String]) -> Self {
        let files = source_files
            .iter()
            .map(|f| (f.clone(), FileStatus::Pending))
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            state: LoadState::Discovering,
            source_folder,
            worker_count,
            files,
            rows_scanned: 0,
            rows_accepted: 0,
            rows_rejected: 0,
            reasons: BTreeMap::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state, stamping the end time on terminal states
    pub fn transition_to(&mut self, new_state: LoadState) {
        self.state = new_state;

        match new_state {
            LoadState::Completed | LoadState::Cancelled | LoadState::Failed => {
                self.ended_at = Some(Utc::now());
            }
            _ => {}
        }
    }

    /// Fold one delivered batch into the run totals
    ///
    /// `inserted` is the row count the store actually accepted; the
    /// shortfall against the batch's accepted count is the number of
    /// duplicate identifiers, which are re-tallied as rejections so that
    /// scanned == accepted + rejected holds at the run level too.
    pub fn apply_batch(&mut self, summary: &BatchSummary, inserted: u64) {
        let duplicates = summary.accepted.saturating_sub(inserted);

        self.rows_scanned += summary.rows_read;
        self.rows_accepted += inserted;
        self.rows_rejected += summary.rejected + duplicates;

        for (reason, count) in &summary.reasons {
            *self.reasons.entry(*reason).or_insert(0) += count;
        }
        if duplicates > 0 {
            *self.reasons.entry(RejectReason::DuplicateId).or_insert(0) += duplicates;
        }

        self.files.insert(
            summary.source_file.clone(),
            FileStatus::Loaded {
                rows_read: summary.rows_read,
                accepted: inserted,
                rejected: summary.rejected + duplicates,
            },
        );
    }

    /// Record a chunk that could not be read at all
    pub fn mark_file_failed(&mut self, source_file: &str, error: String) {
        self.files
            .insert(source_file.to_string(), FileStatus::Failed { error });
    }

    pub fn files_total(&self) -> usize {
        self.files.len()
    }

    pub fn files_failed(&self) -> usize {
        self.files
            .values()
            .filter(|s| matches!(s, FileStatus::Failed { .. }))
            .count()
    }

    pub fn files_loaded(&self) -> usize {
        self.files
            .values()
            .filter(|s| matches!(s, FileStatus::Loaded { .. }))
            .count()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            LoadState::Completed | LoadState::Cancelled | LoadState::Failed
        )
    }

    /// Snapshot the run as a reportable summary
    pub fn to_summary(&self) -> RunSummary {
        let reasons = self
            .reasons
            .iter()
            .map(|(reason, count)| (reason.as_str().to_string(), *count))
            .collect();

        let elapsed_ms = match self.ended_at {
            Some(ended) => (ended - self.started_at).num_milliseconds().max(0) as u64,
            None => (Utc::now() - self.started_at).num_milliseconds().max(0) as u64,
        };

        RunSummary {
            run_id: self.run_id,
            state: self.state,
            source_folder: self.source_folder.clone(),
            worker_count: self.worker_count,
            files_total: self.files_total() as u64,
            files_loaded: self.files_loaded() as u64,
            files_failed: self.files_failed() as u64,
            rows_scanned: self.rows_scanned,
            rows_accepted: self.rows_accepted,
            rows_rejected: self.rows_rejected,
            rejection_reasons: reasons,
            files: self.files.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            elapsed_ms,
        }
    }
}

/// Machine-readable run report, produced at finalize and persisted with
/// the run row. Presentation tooling consumes this; the pipeline only
/// produces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: LoadState,
    pub source_folder: String,
    pub worker_count: usize,
    pub files_total: u64,
    pub files_loaded: u64,
    pub files_failed: u64,
    pub rows_scanned: u64,
    pub rows_accepted: u64,
    pub rows_rejected: u64,
    /// Rejection counts keyed by reason code
    pub rejection_reasons: BTreeMap<String, u64>,
    pub files: BTreeMap<String, FileStatus>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_summary_counts_balance() {
        let mut summary = BatchSummary::new("books.csv".to_string());
        summary.record_accepted();
        summary.record_accepted();
        summary.record_rejected(RejectReason::MissingId);
        summary.record_rejected(RejectReason::UnparseableRating);

        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.accepted + summary.rejected, summary.rows_read);
        assert_eq!(summary.reasons[&RejectReason::MissingId], 1);
    }

    #[test]
    fn test_apply_batch_accounts_for_duplicates() {
        let mut run = LoadRun::new("/data".to_string(), 2, &["a.csv".to_string()]);

        let mut summary = BatchSummary::new("a.csv".to_string());
        for _ in 0..5 {
            summary.record_accepted();
        }
        summary.record_rejected(RejectReason::EmptyTitle);

        // Store only took 3 of the 5 accepted rows: 2 were duplicate ids
        run.apply_batch(&summary, 3);

        assert_eq!(run.rows_scanned, 6);
        assert_eq!(run.rows_accepted, 3);
        assert_eq!(run.rows_rejected, 3);
        assert_eq!(run.reasons[&RejectReason::DuplicateId], 2);
        assert_eq!(run.rows_scanned, run.rows_accepted + run.rows_rejected);
    }

    #[test]
    fn test_terminal_states_stamp_end_time() {
        let mut run = LoadRun::new("/data".to_string(), 1, &[]);
        assert!(run.ended_at.is_none());

        run.transition_to(LoadState::Loading);
        assert!(!run.is_terminal());
        assert!(run.ended_at.is_none());

        run.transition_to(LoadState::Completed);
        assert!(run.is_terminal());
        assert!(run.ended_at.is_some());
    }

    #[test]
    fn test_summary_reason_codes_are_stable_strings() {
        let mut run = LoadRun::new("/data".to_string(), 1, &["a.csv".to_string()]);
        let mut summary = BatchSummary::new("a.csv".to_string());
        summary.record_rejected(RejectReason::MissingTitle);
        run.apply_batch(&summary, 0);

        let report = run.to_summary();
        assert_eq!(report.rejection_reasons["missing_title"], 1);
    }
}
