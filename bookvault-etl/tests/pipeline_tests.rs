//! End-to-end pipeline tests
//!
//! Each test drives a full run over a small source folder in a temp dir
//! and inspects the summary, the store, and the query path.

use bookvault_etl::models::LoadState;
use bookvault_etl::{run_pipeline, EtlError, PipelineConfig};
use bookvault_search::{open_store, search_books, SearchQuery};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    db_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("csv");
        fs::create_dir(&source).unwrap();
        let db_path = dir.path().join("bookvault.db");
        Self {
            _dir: dir,
            source,
            db_path,
        }
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.source.join(name), contents).unwrap();
    }

    fn config(&self, workers: usize) -> PipelineConfig {
        PipelineConfig {
            source_folder: self.source.clone(),
            db_path: self.db_path.clone(),
            worker_count: workers,
            summary_out: None,
        }
    }
}

#[tokio::test]
async fn test_end_to_end_three_files() {
    let fx = Fixture::new();

    // One file without a rating column at all
    fx.write("no_rating.csv", "Id,Name\n1,Book One\n2,Book Two\n3,Book Three\n");
    // One file with a malformed rating value
    fx.write("bad_rating.csv", "Id,Name,Rating\n4,Bad Rating,N/A\n5,Fine Book,3.5\n");
    // One well-formed file
    fx.write(
        "good.csv",
        "Id,Name,Rating\n6,The Well Formed Novel,4.8\n7,Seventh,4.0\n8,Eighth,3.0\n9,Ninth,2.0\n10,Tenth,1.0\n",
    );

    let summary = run_pipeline(fx.config(2), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, LoadState::Completed);
    assert_eq!(summary.rows_scanned, 10);
    assert_eq!(summary.rows_accepted, 9);
    assert_eq!(summary.rows_rejected, 1);
    assert_eq!(summary.rejection_reasons["unparseable_rating"], 1);
    assert_eq!(summary.files_loaded, 3);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(
        summary.rows_accepted + summary.rows_rejected,
        summary.rows_scanned
    );

    // The finished store answers queries
    let pool = open_store(&fx.db_path).await.unwrap();
    let results = search_books(&pool, &SearchQuery::title_contains("Well Formed"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "The Well Formed Novel");
    assert_eq!(results[0].average_rating, Some(4.8));

    // A miss is an empty result, not an error
    let results = search_books(&pool, &SearchQuery::title_contains("No Such Book"))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_one_failed_chunk_among_five_does_not_fail_the_run() {
    let fx = Fixture::new();

    for i in 0..4 {
        fx.write(
            &format!("part{}.csv", i),
            &format!("Id,Name,Rating\n{},Book {},4.0\n", i, i),
        );
    }
    // Corrupt file: the header row is not valid UTF-8, so the chunk fails
    // before any row is read
    fs::write(fx.source.join("broken.csv"), b"\xff\xfe\x00junk\n1,2\n").unwrap();

    let summary = run_pipeline(fx.config(3), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, LoadState::Completed);
    assert_eq!(summary.files_total, 5);
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.files_loaded, 4);
    assert_eq!(summary.rows_accepted, 4);

    // The four healthy files' records are all present
    let pool = open_store(&fx.db_path).await.unwrap();
    let results = search_books(&pool, &SearchQuery::title_contains("Book"))
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
}

#[tokio::test]
async fn test_all_chunks_failed_is_fatal_and_store_not_finalized() {
    let fx = Fixture::new();
    fs::write(fx.source.join("broken.csv"), b"\xff\xfe\x00junk\n1,2\n").unwrap();

    let result = run_pipeline(fx.config(2), CancellationToken::new()).await;
    assert!(matches!(result, Err(EtlError::AllChunksFailed(1))));

    // The run row records the failure and the "done" marker never ran
    let pool = bookvault_common::db::open_read_only(&fx.db_path).await.unwrap();

    let state: String =
        sqlx::query_scalar("SELECT state FROM load_runs ORDER BY started_at DESC LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(state, "failed");

    let index_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_books_%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(index_count, 0, "a failed run must not build indexes");

    // And the query service refuses the store outright
    let refused = open_store(&fx.db_path).await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_duplicate_ids_across_files_first_write_wins() {
    let fx = Fixture::new();

    // Single worker makes delivery order deterministic: a.csv then b.csv
    fx.write("a.csv", "Id,Name,Rating\n1,First Title,4.0\n");
    fx.write("b.csv", "Id,Name,Rating\n1,Second Title,2.0\n2,Unique,3.0\n");

    let summary = run_pipeline(fx.config(1), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.rows_scanned, 3);
    assert_eq!(summary.rows_accepted, 2);
    assert_eq!(summary.rows_rejected, 1);
    assert_eq!(summary.rejection_reasons["duplicate_id"], 1);

    let pool = open_store(&fx.db_path).await.unwrap();
    let stored = bookvault_common::db::load_book_by_id(&pool, "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "First Title");
    assert_eq!(stored.average_rating, Some(4.0));
}

#[tokio::test]
async fn test_cancelled_run_finalizes_what_was_committed() {
    let fx = Fixture::new();
    fx.write("a.csv", "Id,Name\n1,Book One\n");
    fx.write("b.csv", "Id,Name\n2,Book Two\n");

    // Cancelled before any chunk is taken: nothing loads, but the run
    // still finalizes into a consistent, indexed store.
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_pipeline(fx.config(2), cancel).await.unwrap();

    assert_eq!(summary.state, LoadState::Cancelled);
    assert_eq!(summary.rows_accepted, 0);

    // Indexed and openable, just empty
    let pool = open_store(&fx.db_path).await.unwrap();
    let results = search_books(&pool, &SearchQuery::title_contains("Book"))
        .await
        .unwrap();
    assert!(results.is_empty());

    let index_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_books_%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(index_count, 2);
}

#[tokio::test]
async fn test_empty_source_folder_is_fatal() {
    let fx = Fixture::new();

    let result = run_pipeline(fx.config(2), CancellationToken::new()).await;
    assert!(matches!(result, Err(EtlError::NoSourceFiles(_))));
}

#[tokio::test]
async fn test_missing_source_folder_is_fatal() {
    let fx = Fixture::new();
    let config = PipelineConfig {
        source_folder: Path::new("/nonexistent/source").to_path_buf(),
        ..fx.config(2)
    };

    let result = run_pipeline(config, CancellationToken::new()).await;
    assert!(matches!(result, Err(EtlError::Discover(_))));
}

#[tokio::test]
async fn test_summary_file_written_when_requested() {
    let fx = Fixture::new();
    fx.write("a.csv", "Id,Name,Rating\n1,Solo,4.5\n");

    let summary_path = fx._dir.path().join("summary.json");
    let config = PipelineConfig {
        summary_out: Some(summary_path.clone()),
        ..fx.config(1)
    };

    run_pipeline(config, CancellationToken::new()).await.unwrap();

    let raw = fs::read_to_string(&summary_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["rows_accepted"], 1);
    assert_eq!(parsed["state"], "COMPLETED");
    assert_eq!(parsed["files"]["a.csv"]["status"], "loaded");
}
