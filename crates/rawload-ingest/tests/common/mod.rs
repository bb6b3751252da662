//! Common test utilities for rawload integration tests
//!
//! - [`FakeToolbox`]: an in-memory [`Toolbox`] that records every call and can
//!   be told to fail
//! - [`Fixture`]: a temporary source directory + staging root

#![allow(dead_code)]

use rawload_common::TableName;
use rawload_ingest::config::PipelineConfig;
use rawload_ingest::router::ExtractMethod;
use rawload_ingest::tools::{ShellCommand, Toolbox};
use rawload_ingest::ToolError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TABLE: &str = "IMP_TEST";

/// One recorded toolbox invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Extract { input: String, method: ExtractMethod },
    ConvertAndLoad { converter: String, sink: String },
}

/// Toolbox fake.
///
/// Extraction writes the files registered with [`FakeToolbox::unpacks`] for
/// that input, or copies the input itself when nothing is registered.
#[derive(Default)]
pub struct FakeToolbox {
    contents: HashMap<String, Vec<(String, Vec<u8>)>>,
    fail_extract: Option<String>,
    fail_convert: Option<String>,
    calls: RefCell<Vec<Call>>,
}

impl FakeToolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unpacks(mut self, input: &str, files: &[&str]) -> Self {
        self.contents.insert(
            input.to_string(),
            files
                .iter()
                .map(|f| (f.to_string(), format!("contents of {}", f).into_bytes()))
                .collect(),
        );
        self
    }

    /// Fail extraction of the input named `input`
    pub fn failing_extract(mut self, input: &str) -> Self {
        self.fail_extract = Some(input.to_string());
        self
    }

    /// Fail any converter whose command line mentions `needle`
    pub fn failing_convert(mut self, needle: &str) -> Self {
        self.fail_convert = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn conversions(&self) -> Vec<(String, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::ConvertAndLoad { converter, sink } => Some((converter.clone(), sink.clone())),
                Call::Extract { .. } => None,
            })
            .collect()
    }

    pub fn extracted_inputs(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Extract { input, .. } => Some(input.clone()),
                Call::ConvertAndLoad { .. } => None,
            })
            .collect()
    }
}

fn failure(command: &str) -> ToolError {
    ToolError::Failed {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stdout: String::new(),
        stderr: "simulated failure".to_string(),
    }
}

impl Toolbox for FakeToolbox {
    fn extract(&self, method: &ExtractMethod, input: &Path, dest: &Path) -> Result<(), ToolError> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.borrow_mut().push(Call::Extract {
            input: name.clone(),
            method: method.clone(),
        });

        if self.fail_extract.as_deref() == Some(name.as_str()) {
            return Err(failure(&format!("extract {}", name)));
        }

        let archive_error = |source| ToolError::Archive {
            archive: input.to_path_buf(),
            source,
        };

        match self.contents.get(&name) {
            Some(files) => {
                for (file, data) in files {
                    fs::write(dest.join(file), data).map_err(archive_error)?;
                }
            },
            None => {
                fs::copy(input, dest.join(&name)).map_err(archive_error)?;
            },
        }
        Ok(())
    }

    fn convert_and_load(
        &self,
        converter: &ShellCommand,
        sink: &ShellCommand,
    ) -> Result<(), ToolError> {
        self.calls.borrow_mut().push(Call::ConvertAndLoad {
            converter: converter.to_string(),
            sink: sink.to_string(),
        });

        match &self.fail_convert {
            Some(needle) if converter.as_str().contains(needle.as_str()) => {
                Err(failure(converter.as_str()))
            },
            _ => Ok(()),
        }
    }
}

/// Temporary source directory and staging root for one table
pub struct Fixture {
    _temp: TempDir,
    pub table_path: PathBuf,
    pub staging_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let table_path = temp.path().join("source");
        let staging_root = temp.path().join("staging");
        fs::create_dir(&table_path).expect("Failed to create source dir");

        Self {
            _temp: temp,
            table_path,
            staging_root,
        }
    }

    /// Drop an input file into the source directory
    pub fn add_input(&self, name: &str) -> &Self {
        fs::write(self.table_path.join(name), format!("raw {}", name))
            .expect("Failed to write input");
        self
    }

    pub fn write_journal(&self, content: &str) {
        fs::write(self.journal_path(), content).expect("Failed to write journal");
    }

    pub fn journal_path(&self) -> PathBuf {
        self.table_path.join("journal.txt")
    }

    /// Journal text, empty when no journal exists
    pub fn journal(&self) -> String {
        fs::read_to_string(self.journal_path()).unwrap_or_default()
    }

    /// Filename lines of the journal, in order
    pub fn journal_files(&self) -> Vec<String> {
        self.journal()
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_root.join(TABLE)
    }

    /// Sorted file names currently in staging
    pub fn staged(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.staging_dir()) {
            Ok(entries) => entries
                .map(|e| e.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::builder(
            TableName::new(TABLE).expect("valid table"),
            &self.table_path,
            "loader set-{table}",
        )
        .staging_root(&self.staging_root)
        .build()
    }
}
