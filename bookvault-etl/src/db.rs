//! Load run persistence
//!
//! The run row is saved as it progresses so a reader (or a human with the
//! sqlite3 shell) can see where a rebuild stands; the final save at
//! finalize carries the full summary JSON.

use crate::models::LoadRun;
use bookvault_common::{Error, Result};
use sqlx::SqlitePool;

/// Upsert the run row, including a JSON snapshot of the current summary
pub async fn save_run(pool: &SqlitePool, run: &LoadRun) -> Result<()> {
    let summary = serde_json::to_string(&run.to_summary())
        .map_err(|e| Error::Internal(format!("Summary serialization failed: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO load_runs (
            run_id, state, source_folder, worker_count,
            rows_scanned, rows_accepted, rows_rejected,
            files_total, files_failed, summary, started_at, ended_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            state = excluded.state,
            rows_scanned = excluded.rows_scanned,
            rows_accepted = excluded.rows_accepted,
            rows_rejected = excluded.rows_rejected,
            files_total = excluded.files_total,
            files_failed = excluded.files_failed,
            summary = excluded.summary,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(run.state.as_str())
    .bind(&run.source_folder)
    .bind(run.worker_count as i64)
    .bind(run.rows_scanned as i64)
    .bind(run.rows_accepted as i64)
    .bind(run.rows_rejected as i64)
    .bind(run.files_total() as i64)
    .bind(run.files_failed() as i64)
    .bind(summary)
    .bind(run.started_at.to_rfc3339())
    .bind(run.ended_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}
