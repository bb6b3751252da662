//! Common types used across rawload

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Name of a logical dataset.
///
/// A table name doubles as a directory name (the staging area lives at
/// `<staging_root>/<table>`) and is substituted into sink command lines, so
/// it must be a single, non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Validate and wrap a table name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(CommonError::invalid_table_name(name, "must not be empty"));
        }
        if name == "." || name == ".." {
            return Err(CommonError::invalid_table_name(
                name,
                "must not be a relative path component",
            ));
        }
        if name.contains(['/', '\\']) {
            return Err(CommonError::invalid_table_name(
                name,
                "must not contain path separators",
            ));
        }
        if name.contains('\0') {
            return Err(CommonError::invalid_table_name(name, "must not contain NUL"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TableName {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
