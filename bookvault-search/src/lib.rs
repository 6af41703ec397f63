//! bookvault-search library interface
//!
//! Read-only lookups against a finalized BookVault store.

pub mod query;

pub use crate::query::{open_store, search_books, SearchField, SearchQuery};
