//! # BookVault Common Library
//!
//! Shared code for the BookVault tools:
//! - Error types
//! - Data directory and configuration resolution
//! - Database open/initialization and the canonical book schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
