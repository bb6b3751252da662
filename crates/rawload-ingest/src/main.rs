//! Rawload - incremental raw file ingestion

use anyhow::Context;
use clap::Parser;
use rawload_common::logging::{init_logging, LogConfig, LogLevel, LoggingGuard};
use rawload_ingest::cli::Cli;
use rawload_ingest::pipeline::{IngestionPipeline, RunOutcome};
use rawload_ingest::tools::SystemToolbox;
use rawload_ingest::IngestError;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    match execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        },
    }
}

/// Build the logging configuration from the flags, with `LOG_*` variables
/// taking precedence
fn setup_logging(cli: &Cli) -> anyhow::Result<LoggingGuard> {
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("rawload")
        .build()
        .merge_env()
        .context("Invalid logging configuration")?;

    init_logging(&log_config)
}

fn execute(cli: &Cli) -> rawload_ingest::Result<ExitCode> {
    let config = cli.to_config()?;
    config.validate()?;

    let pipeline = IngestionPipeline::new(config, SystemToolbox::new());

    if cli.dry_run {
        let pending = pipeline.pending()?;
        info!(count = pending.len(), "Dry run, nothing will be processed");
        for name in &pending {
            println!("{}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    match pipeline.run()? {
        RunOutcome::NothingToDo => Ok(ExitCode::from(cli.idle_exit_code)),
        RunOutcome::Completed { remaining, .. } => {
            if remaining > 0 {
                info!(remaining, "More new files are waiting for the next run");
            }
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn report(e: &IngestError) {
    match e.tool_error() {
        Some(tool) => {
            let (stdout, stderr) = tool.captured_output().unwrap_or_default();
            error!(
                error = %e,
                command = tool.command().unwrap_or_default(),
                stdout,
                stderr,
                "Ingestion failed"
            );
        },
        None => error!(error = %e, "Ingestion failed"),
    }
    eprintln!("Error: {}", e);
}
