//! Command-line interface
//!
//! Every flag can also come from a `RAWLOAD_*` environment variable (or a
//! `.env` file), which is how the ingestion hosts configure scheduled runs.

use crate::config::{default_staging_root, PipelineConfig, RoutingFile, DEFAULT_ORIGIN_FLAG};
use crate::error::Result;
use crate::router::RoutingTable;
use clap::Parser;
use rawload_common::TableName;
use std::path::PathBuf;

/// Rawload - incremental raw file ingestion
#[derive(Parser, Debug)]
#[command(name = "rawload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Table (dataset) name; also the staging namespace and `{table}` value
    #[arg(long, env = "RAWLOAD_TABLE")]
    pub table: String,

    /// Source directory with the raw files and journal.txt
    #[arg(long, env = "RAWLOAD_TABLE_PATH")]
    pub table_path: PathBuf,

    /// Sink command reading rows on stdin, e.g. "csv-loader set-{table}"
    #[arg(long, env = "RAWLOAD_SINK")]
    pub sink: String,

    /// TOML file overriding the extension routing
    #[arg(long, env = "RAWLOAD_ROUTES")]
    pub routes: Option<PathBuf>,

    /// Directory under which the per-table staging directory is created
    #[arg(long, env = "RAWLOAD_STAGING_ROOT")]
    pub staging_root: Option<PathBuf>,

    /// Process at most one new file, then stop
    #[arg(long, env = "RAWLOAD_SINGLE_FILE")]
    pub single_file: bool,

    /// Pass "<input>:<artifact>" to the sink before its last argument
    #[arg(long, env = "RAWLOAD_INJECT_ORIGIN")]
    pub inject_origin: bool,

    /// Flag used for the origin metadata
    #[arg(long, env = "RAWLOAD_ORIGIN_FLAG", default_value = DEFAULT_ORIGIN_FLAG)]
    pub origin_flag: String,

    /// Remove files left in staging by earlier runs before starting
    #[arg(long, env = "RAWLOAD_PURGE_STAGING")]
    pub purge_staging: bool,

    /// Exit code when there is nothing to do (legacy hosts expect 9)
    #[arg(long, env = "RAWLOAD_IDLE_EXIT_CODE", default_value_t = 0)]
    pub idle_exit_code: u8,

    /// List the files a run would process and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the pipeline configuration, loading the routing file if given
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let table = TableName::new(self.table.as_str())?;

        let routing = match &self.routes {
            Some(path) => RoutingFile::load(path)?.routing_for(&table),
            None => RoutingTable::default(),
        };

        Ok(PipelineConfig::builder(table, &self.table_path, &self.sink)
            .staging_root(
                self.staging_root
                    .clone()
                    .unwrap_or_else(default_staging_root),
            )
            .routing(routing)
            .single_file(self.single_file)
            .inject_origin(self.inject_origin)
            .origin_flag(&self.origin_flag)
            .purge_staging(self.purge_staging)
            .build())
    }
}
