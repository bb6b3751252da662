//! Error types for rawload ingestion
//!
//! Every fatal condition of a run is an [`IngestError`] value that travels up
//! to `main`, which logs it and picks the exit code. Nothing below `main`
//! terminates the process.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal errors of an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Table(#[from] rawload_common::CommonError),

    #[error("Failed to read routing file {}: {source}", path.display())]
    RoutingRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid routing file {}: {source}", path.display())]
    RoutingParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The journal exists but cannot be read; the run cannot know what is done
    #[error("Failed to read journal {}: {source}", path.display())]
    JournalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write journal {}: {source}", path.display())]
    JournalWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to prepare staging directory {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Extraction of '{input}' failed: {source}")]
    Extraction {
        input: String,
        #[source]
        source: ToolError,
    },

    #[error("Conversion of '{artifact}' failed: {source}")]
    Conversion {
        artifact: String,
        #[source]
        source: ToolError,
    },

    #[error("Failed to remove staged artifact {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The external tool failure behind this error, if any
    pub fn tool_error(&self) -> Option<&ToolError> {
        match self {
            Self::Extraction { source, .. } | Self::Conversion { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure of an extractor, converter or sink invocation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    /// Built-in extractor could not read the archive or write its contents
    #[error("cannot unpack {}: {source}", archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Spawn { command, .. } | Self::Failed { command, .. } => Some(command),
            Self::Archive { .. } => None,
        }
    }

    /// Captured (stdout, stderr) of a failed process
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Failed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_is_exposed_for_conversion() {
        let err = IngestError::Conversion {
            artifact: "a.mdb".to_string(),
            source: ToolError::Failed {
                command: "mdb-export 'a.mdb'".to_string(),
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: "boom".to_string(),
            },
        };

        let tool = err.tool_error().unwrap();
        assert_eq!(tool.command(), Some("mdb-export 'a.mdb'"));
        assert_eq!(tool.captured_output(), Some(("", "boom")));
        assert_eq!(
            err.to_string(),
            "Conversion of 'a.mdb' failed: `mdb-export 'a.mdb'` exited with exit status: 1"
        );
    }

    #[test]
    fn test_non_tool_errors_have_no_tool() {
        let err = IngestError::config("missing sink");
        assert!(err.tool_error().is_none());
        assert_eq!(err.to_string(), "Configuration error: missing sink");
    }
}
