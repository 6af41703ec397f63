//! bookvault-search - Book catalog lookup
//!
//! Read-only consumer of the BookVault store: searches the indexed catalog
//! by title or author and prints the best-rated matches.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bookvault_search::{open_store, search_books, SearchField, SearchQuery};

#[derive(Parser, Debug)]
#[command(name = "bookvault-search", about = "Book catalog lookup", version)]
struct Args {
    /// Keyword to search for
    keyword: String,

    /// Database file (defaults to the resolved data folder)
    #[arg(long, env = "BOOKVAULT_DB")]
    db: Option<PathBuf>,

    /// Field the predicate applies to
    #[arg(long, value_enum, default_value = "title")]
    field: SearchField,

    /// Require an exact match instead of a substring match
    #[arg(long)]
    exact: bool,

    /// Only show books rated at least this highly
    #[arg(long)]
    min_rating: Option<f64>,

    /// Maximum number of results
    #[arg(long, default_value_t = 10)]
    limit: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let db_path = args.db.unwrap_or_else(|| {
        let data_folder = bookvault_common::config::resolve_data_folder(None, "BOOKVAULT_DATA_DIR");
        bookvault_common::config::database_path(&data_folder)
    });

    let pool = open_store(&db_path).await?;

    let query = SearchQuery {
        keyword: args.keyword.clone(),
        field: args.field,
        exact: args.exact,
        min_rating: args.min_rating,
        limit: args.limit,
    };

    let results = search_books(&pool, &query).await?;

    if results.is_empty() {
        println!("No books matched '{}'", args.keyword);
        return Ok(());
    }

    println!("Top {} matches for '{}':", results.len(), args.keyword);
    for book in &results {
        let rating = book
            .average_rating
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "  - ".to_string());
        match &book.author {
            Some(author) => println!("{}  {} ({})", rating, book.title, author),
            None => println!("{}  {}", rating, book.title),
        }
    }

    Ok(())
}
