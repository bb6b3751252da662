//! Rawload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the rawload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup shared by every binary
//! - **Types**: validated domain values such as [`TableName`]
//!
//! # Example
//!
//! ```no_run
//! use rawload_common::{Result, TableName};
//!
//! fn staging_dir(table: &str) -> Result<std::path::PathBuf> {
//!     let table: TableName = table.parse()?;
//!     Ok(std::env::temp_dir().join(table.as_str()))
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::TableName;
