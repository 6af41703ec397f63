//! Error types for the ETL pipeline
//!
//! Row-level defects never surface here: they are tallied per batch and
//! reported in the run summary. This type covers the run-level conditions
//! that abort a rebuild.

use crate::discover::DiscoverError;
use thiserror::Error;

/// Run-level pipeline error
#[derive(Debug, Error)]
pub enum EtlError {
    /// Source discovery failed (missing folder, not a directory)
    #[error(transparent)]
    Discover(#[from] DiscoverError),

    /// Source folder contained no CSV files at all
    #[error("No CSV files found in {0}")]
    NoSourceFiles(String),

    /// Every chunk failed; nothing could be loaded
    #[error("All {0} source files failed to load")]
    AllChunksFailed(usize),

    /// Store could not be opened or written
    #[error("Store error: {0}")]
    Store(#[from] bookvault_common::Error),

    /// Run summary could not be written
    #[error("Summary write error: {0}")]
    SummaryWrite(#[from] std::io::Error),
}
