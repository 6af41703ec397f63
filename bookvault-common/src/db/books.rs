//! Canonical book record

use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// One canonical book row
///
/// Every record in the `books` table has this shape regardless of which
/// source file (and column layout) it came from. Optional fields carry
/// `None` when the source had no usable value; `average_rating` is always
/// within [0.0, 5.0] once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
    pub publication_year: Option<i64>,
}

impl BookRecord {
    /// Build a record from a `books` row
    pub fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            book_id: row.get("book_id"),
            title: row.get("title"),
            author: row.get("author"),
            average_rating: row.get("average_rating"),
            ratings_count: row.get("ratings_count"),
            publication_year: row.get("publication_year"),
        }
    }
}

/// Count rows in the books table
pub async fn count_books(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Load one book by identifier
pub async fn load_book_by_id(pool: &SqlitePool, book_id: &str) -> Result<Option<BookRecord>> {
    let row = sqlx::query(
        r#"
        SELECT book_id, title, author, average_rating, ratings_count, publication_year
        FROM books
        WHERE book_id = ?
        "#,
    )
    .bind(book_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| BookRecord::from_row(&r)))
}
