//! Error types shared across rawload crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by shared domain types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid table name '{name}': {reason}")]
    InvalidTableName { name: String, reason: &'static str },
}

impl CommonError {
    /// Create an invalid table name error
    pub fn invalid_table_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidTableName {
            name: name.into(),
            reason,
        }
    }
}
