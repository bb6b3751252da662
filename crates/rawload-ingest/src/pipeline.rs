//! Ingestion pipeline
//!
//! One run walks this state machine:
//!
//! ```text
//! load journal -> diff -> (nothing new) -> NothingToDo
//!                      -> for each new input:
//!                           stage -> for each artifact: classify ->
//!                             convert+load | discard | leave
//!                           -> append input -> persist journal
//! ```
//!
//! An input is appended to the journal only after every artifact derived from
//! it was handled, and the journal is persisted after every input. A crash
//! therefore loses at most the input in flight, which the next run redoes.

use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use crate::journal::{Journal, JOURNAL_FILE_NAME};
use crate::router::Route;
use crate::scanner::{diff_new_files, list_files};
use crate::staging::StagingArea;
use crate::tools::{ShellCommand, Toolbox};
use chrono::{Local, NaiveDateTime};
use std::path::Path;
use tracing::{debug, info, info_span, warn};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every input in the source directory was already recorded
    NothingToDo,
    Completed {
        /// Inputs recorded by this run, in processing order
        processed: Vec<String>,
        /// New inputs left for a later run (single-file mode)
        remaining: usize,
    },
}

pub struct IngestionPipeline<T: Toolbox> {
    config: PipelineConfig,
    toolbox: T,
    staging: StagingArea,
}

impl<T: Toolbox> IngestionPipeline<T> {
    pub fn new(config: PipelineConfig, toolbox: T) -> Self {
        let staging = StagingArea::new(&config.staging_root, &config.table);
        Self {
            config,
            toolbox,
            staging,
        }
    }

    /// Inputs in the source directory that the journal does not cover yet
    pub fn pending(&self) -> Result<Vec<String>> {
        let journal = Journal::load(&self.config.journal_path())?;
        self.pending_in(&journal)
    }

    fn pending_in(&self, journal: &Journal) -> Result<Vec<String>> {
        let mut dir_files = list_files(&self.config.table_path, Some(JOURNAL_FILE_NAME))?;

        // A name the journal cannot hold would be reprocessed on every run
        dir_files.retain(|name| {
            let recordable = Journal::can_record(name);
            if !recordable {
                warn!(file = ?name, "Skipping input whose name cannot be recorded in the journal");
            }
            recordable
        });

        Ok(diff_new_files(&dir_files, &journal.filename_entries()))
    }

    pub fn run(&self) -> Result<RunOutcome> {
        self.run_at(Local::now().naive_local())
    }

    /// Run with an explicit start time for the journal's run marker
    pub fn run_at(&self, started_at: NaiveDateTime) -> Result<RunOutcome> {
        let journal_path = self.config.journal_path();
        let mut journal = Journal::load(&journal_path)?;

        let pending = self.pending_in(&journal)?;
        if pending.is_empty() {
            info!(table = %self.config.table, "No new files found");
            return Ok(RunOutcome::NothingToDo);
        }

        info!(
            table = %self.config.table,
            count = pending.len(),
            "Found new input files"
        );

        self.staging.prepare()?;
        if self.config.purge_staging {
            self.staging.purge()?;
        }

        // Reaches disk together with the first completed input
        journal.append_run_marker(started_at);

        let mut processed = Vec::new();
        for input in &pending {
            let span = info_span!("input", file = %input);
            let _enter = span.enter();

            self.process_input(input)?;

            journal.append_file(input.as_str());
            journal.persist(&journal_path)?;
            info!("Input recorded as processed");
            processed.push(input.clone());

            if self.config.single_file {
                break;
            }
        }

        let remaining = pending.len() - processed.len();
        info!(
            table = %self.config.table,
            processed = ?processed,
            remaining,
            "Mission complete"
        );

        Ok(RunOutcome::Completed {
            processed,
            remaining,
        })
    }

    /// Stage one input and handle everything that lands in staging
    fn process_input(&self, input: &str) -> Result<()> {
        let input_path = self.config.table_path.join(input);

        match self.config.routing.extract_method(input) {
            Some(method) => {
                info!(method = %method, "Extracting input");
                self.toolbox
                    .extract(method, &input_path, self.staging.path())
                    .map_err(|source| IngestError::Extraction {
                        input: input.to_string(),
                        source,
                    })?;
            },
            None => warn!("No extractor for this file type, nothing to extract"),
        }

        let artifacts = self.staging.artifacts()?;
        debug!(count = artifacts.len(), "Artifacts in staging");

        for artifact in &artifacts {
            self.handle_artifact(input, artifact)?;
        }

        Ok(())
    }

    fn handle_artifact(&self, input: &str, artifact: &Path) -> Result<()> {
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.config.routing.classify(&name) {
            Route::ConvertAndLoad { converter } => {
                let artifact_arg = artifact.to_string_lossy();
                let converter = ShellCommand::render(
                    converter,
                    &[
                        ("input", artifact_arg.as_ref()),
                        ("table", self.config.table.as_str()),
                    ],
                );
                let sink = self.sink_command(input, &name);

                info!(artifact = %name, "Converting and loading");
                self.toolbox
                    .convert_and_load(&converter, &sink)
                    .map_err(|source| IngestError::Conversion {
                        artifact: name.clone(),
                        source,
                    })?;
                self.staging.remove_artifact(artifact)?;
            },
            Route::Discard => {
                info!(artifact = %name, "Discarding");
                self.staging.remove_artifact(artifact)?;
            },
            Route::Unsupported => {
                warn!(artifact = %name, "Unsupported file type, leaving it in staging");
            },
        }

        Ok(())
    }

    fn sink_command(&self, input: &str, artifact: &str) -> ShellCommand {
        let sink = ShellCommand::render(&self.config.sink, &[("table", self.config.table.as_str())]);

        if self.config.inject_origin {
            sink.with_flag_before_last(&self.config.origin_flag, &format!("{}:{}", input, artifact))
        } else {
            sink
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::router::ExtractMethod;
    use rawload_common::TableName;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records sink commands, copies inputs as their own artifact
    #[derive(Default)]
    struct RecordingToolbox {
        sinks: RefCell<Vec<String>>,
    }

    impl Toolbox for RecordingToolbox {
        fn extract(
            &self,
            _method: &ExtractMethod,
            input: &Path,
            dest: &Path,
        ) -> std::result::Result<(), ToolError> {
            std::fs::copy(input, dest.join(input.file_name().unwrap())).unwrap();
            Ok(())
        }

        fn convert_and_load(
            &self,
            _converter: &ShellCommand,
            sink: &ShellCommand,
        ) -> std::result::Result<(), ToolError> {
            self.sinks.borrow_mut().push(sink.to_string());
            Ok(())
        }
    }

    fn setup(inject_origin: bool) -> (TempDir, PipelineConfig) {
        let temp = TempDir::new().unwrap();
        let table_path = temp.path().join("source");
        std::fs::create_dir(&table_path).unwrap();
        let config = PipelineConfig::builder(
            TableName::new("IMP_CHILE").unwrap(),
            &table_path,
            "loader -addr=db:6379 set-{table}",
        )
        .staging_root(temp.path().join("staging"))
        .inject_origin(inject_origin)
        .build();
        (temp, config)
    }

    #[test]
    fn test_sink_gets_table_and_origin() {
        let (_temp, config) = setup(true);
        std::fs::write(config.table_path.join("jan.xls"), b"x").unwrap();

        let toolbox = RecordingToolbox::default();
        let pipeline = IngestionPipeline::new(config, &toolbox);
        pipeline.run().unwrap();

        assert_eq!(
            toolbox.sinks.borrow().as_slice(),
            ["loader -addr=db:6379 -raw-data-file=jan.xls:jan.xls set-IMP_CHILE"]
        );
    }

    #[test]
    fn test_run_marker_is_written_with_first_input() {
        let (_temp, config) = setup(false);
        std::fs::write(config.table_path.join("jan.xls"), b"x").unwrap();
        let journal_path = config.journal_path();

        let started = NaiveDateTime::parse_from_str("2024-03-01 08:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let toolbox = RecordingToolbox::default();
        IngestionPipeline::new(config, &toolbox).run_at(started).unwrap();

        assert_eq!(
            std::fs::read_to_string(journal_path).unwrap(),
            "# 2024-03-01 08:30:00\njan.xls\n"
        );
    }

    #[test]
    fn test_pending_does_not_touch_anything() {
        let (_temp, config) = setup(false);
        std::fs::write(config.table_path.join("a.zip"), b"x").unwrap();
        std::fs::write(config.journal_path(), "# old run\n").unwrap();
        let staging_dir = config.staging_dir();

        let pipeline = IngestionPipeline::new(config, RecordingToolbox::default());
        assert_eq!(pipeline.pending().unwrap(), vec!["a.zip"]);
        assert!(!staging_dir.exists());
    }
}
