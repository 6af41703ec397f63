//! Database schema and access shared by the ETL pipeline and search tool

pub mod books;
pub mod init;

pub use books::*;
pub use init::*;
