//! Batch loader: the single writer
//!
//! Batches arrive from any worker in any order; each one is written in its
//! own transaction with multi-row inserts. Duplicate identifiers resolve
//! first-write-wins at the store (`ON CONFLICT DO NOTHING`), and the
//! shortfall in `rows_affected` tells the caller how many rows that cost.
//! Indexes are built once, after every batch has landed: bulk inserts into
//! an unindexed table, one finalize pass at the end.

use bookvault_common::db::BookRecord;
use bookvault_common::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Rows per INSERT statement. Six binds per row keeps a chunk well inside
/// SQLite's bound-parameter limit.
const INSERT_CHUNK_ROWS: usize = 100;

/// Bulk-insert one batch of records inside a single transaction
///
/// Returns the number of rows the store actually accepted; the difference
/// against `records.len()` is the duplicate-identifier count. Either the
/// whole batch commits or none of it does.
pub async fn insert_batch(pool: &SqlitePool, records: &[BookRecord]) -> Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for chunk in records.chunks(INSERT_CHUNK_ROWS) {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO books (book_id, title, author, average_rating, ratings_count, publication_year) ",
        );
        builder.push_values(chunk, |mut b, record| {
            b.push_bind(&record.book_id)
                .push_bind(&record.title)
                .push_bind(&record.author)
                .push_bind(record.average_rating)
                .push_bind(record.ratings_count)
                .push_bind(record.publication_year);
        });
        builder.push(" ON CONFLICT(book_id) DO NOTHING");

        let result = builder.build().execute(&mut *tx).await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;

    Ok(inserted)
}

/// Build the lookup indexes over the finished table
///
/// Runs only after every batch has been consumed, and never on a fatally
/// failed run: a present index is the store's "load finished" marker.
pub async fn build_indexes(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_rating ON books(average_rating)")
        .execute(pool)
        .await?;

    info!("Indexes built (idx_books_title, idx_books_rating)");

    Ok(())
}
