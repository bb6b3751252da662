//! Rawload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental ingestion of raw files dropped into a per-table directory.
//!
//! Each run compares the directory against `journal.txt`, unpacks every new
//! file into a staging directory, converts the staged artifacts into rows
//! streamed straight into a sink command, and records the file as processed.
//!
//! # Modules
//!
//! - [`journal`]: the durable processed-file record
//! - [`scanner`]: directory listing and new-work diff
//! - [`staging`]: per-table staging directory
//! - [`router`]: extension based extract/convert/discard decisions
//! - [`tools`]: extractor, converter and sink invocation
//! - [`pipeline`]: the per-run state machine
//!
//! # Example
//!
//! ```no_run
//! use rawload_common::TableName;
//! use rawload_ingest::config::PipelineConfig;
//! use rawload_ingest::pipeline::{IngestionPipeline, RunOutcome};
//! use rawload_ingest::tools::SystemToolbox;
//!
//! fn main() -> anyhow::Result<()> {
//!     let table = TableName::new("IMP_URUGUAY")?;
//!     let config = PipelineConfig::builder(table, "/data/IMP_URUGUAY", "csv-loader set-{table}")
//!         .single_file(true)
//!         .build();
//!     config.validate()?;
//!
//!     match IngestionPipeline::new(config, SystemToolbox::new()).run()? {
//!         RunOutcome::NothingToDo => println!("up to date"),
//!         RunOutcome::Completed { processed, .. } => println!("loaded {:?}", processed),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod journal;
pub mod pipeline;
pub mod router;
pub mod scanner;
pub mod staging;
pub mod tools;

pub use error::{IngestError, Result, ToolError};
