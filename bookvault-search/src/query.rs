//! Read-only book lookups
//!
//! The store is opened with `mode=ro` and checked for finalization before
//! any query runs: a store whose latest load run never reached a terminal
//! indexed state (completed, or cancelled-and-finalized) is refused with an
//! error distinct from "no matches". No match is an empty result, never an
//! error.

use bookvault_common::db::{open_read_only, BookRecord};
use bookvault_common::{Error, Result};
use clap::ValueEnum;
use sqlx::SqlitePool;
use std::path::Path;

/// Field a predicate applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchField {
    Title,
    Author,
}

impl SearchField {
    fn column(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Author => "author",
        }
    }
}

/// One search request
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keyword: String,
    pub field: SearchField,
    /// Exact match instead of substring match
    pub exact: bool,
    /// Drop results rated below this value
    pub min_rating: Option<f64>,
    pub limit: u32,
}

impl SearchQuery {
    /// Substring title search with the default result limit
    pub fn title_contains(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            field: SearchField::Title,
            exact: false,
            min_rating: None,
            limit: 10,
        }
    }
}

/// Open a finalized store read-only
pub async fn open_store(db_path: &Path) -> Result<SqlitePool> {
    let pool = open_read_only(db_path).await?;
    ensure_finalized(&pool).await?;
    Ok(pool)
}

/// Verify the latest load run finished and built its indexes
async fn ensure_finalized(pool: &SqlitePool) -> Result<()> {
    let state: Option<String> =
        sqlx::query_scalar("SELECT state FROM load_runs ORDER BY started_at DESC LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|_| {
                Error::StoreNotFinalized("store has no load_runs table".to_string())
            })?;

    match state.as_deref() {
        // A cancelled run is partial but finalized: indexes exist
        Some("completed") | Some("cancelled") => Ok(()),
        Some(other) => Err(Error::StoreNotFinalized(format!(
            "latest load run state is '{}'",
            other
        ))),
        None => Err(Error::StoreNotFinalized(
            "store has no recorded load run".to_string(),
        )),
    }
}

/// Execute one search
///
/// Results are ordered by average rating descending (unrated last), then
/// title, capped at the query's limit. An empty result is a valid answer.
pub async fn search_books(pool: &SqlitePool, query: &SearchQuery) -> Result<Vec<BookRecord>> {
    if query.keyword.trim().is_empty() {
        return Err(Error::InvalidInput("search keyword is empty".to_string()));
    }

    let column = query.field.column();

    let sql = if query.exact {
        format!(
            "SELECT book_id, title, author, average_rating, ratings_count, publication_year \
             FROM books WHERE {} = ? AND (? IS NULL OR average_rating >= ?) \
             ORDER BY average_rating IS NULL, average_rating DESC, title ASC LIMIT ?",
            column
        )
    } else {
        format!(
            "SELECT book_id, title, author, average_rating, ratings_count, publication_year \
             FROM books WHERE {} LIKE ? ESCAPE '\\' AND (? IS NULL OR average_rating >= ?) \
             ORDER BY average_rating IS NULL, average_rating DESC, title ASC LIMIT ?",
            column
        )
    };

    let predicate = if query.exact {
        query.keyword.clone()
    } else {
        format!("%{}%", escape_like(&query.keyword))
    };

    let rows = sqlx::query(&sql)
        .bind(predicate)
        .bind(query.min_rating)
        .bind(query.min_rating)
        .bind(query.limit as i64)
        .fetch_all(pool)
        .await?;

    tracing::debug!(
        keyword = %query.keyword,
        field = column,
        matches = rows.len(),
        "Search complete"
    );

    Ok(rows.iter().map(BookRecord::from_row).collect())
}

/// Escape LIKE wildcards so the keyword matches literally
fn escape_like(keyword: &str) -> String {
    keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
