//! Process-backed [`Toolbox`]

use super::{archive, ShellCommand, Toolbox};
use crate::error::ToolError;
use crate::router::ExtractMethod;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use tracing::{debug, info};

/// Runs extractors, converters and sinks as child processes of `sh -c`
#[derive(Debug, Clone)]
pub struct SystemToolbox {
    shell: PathBuf,
}

impl SystemToolbox {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    /// Use a different POSIX shell (e.g. `bash` for pipelines that need it)
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn command(&self, line: &ShellCommand) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(line.as_str());
        cmd
    }

    /// Run a single command to completion, capturing its output
    fn run(&self, line: &ShellCommand) -> Result<(), ToolError> {
        info!(command = %line, "Executing");

        let output = self
            .command(line)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| spawn_error(line, source))?;

        check_output(line, &output)
    }
}

impl Default for SystemToolbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolbox for SystemToolbox {
    fn extract(&self, method: &ExtractMethod, input: &Path, dest: &Path) -> Result<(), ToolError> {
        let archive_error = |source| ToolError::Archive {
            archive: input.to_path_buf(),
            source,
        };

        let written = match method {
            ExtractMethod::Zip => archive::extract_zip(input, dest).map_err(archive_error)?,
            ExtractMethod::TarGz => archive::extract_tar_gz(input, dest).map_err(archive_error)?,
            ExtractMethod::Copy => archive::copy_into(input, dest).map_err(archive_error)?,
            ExtractMethod::Command { command } => {
                let input_arg = input.to_string_lossy();
                let dest_arg = dest.to_string_lossy();
                let line = ShellCommand::render(
                    command,
                    &[("input", input_arg.as_ref()), ("dest", dest_arg.as_ref())],
                );
                return self.run(&line);
            },
        };

        debug!(
            input = %input.display(),
            files = written.len(),
            "Unpacked into staging"
        );
        Ok(())
    }

    fn convert_and_load(
        &self,
        converter: &ShellCommand,
        sink: &ShellCommand,
    ) -> Result<(), ToolError> {
        info!(converter = %converter, sink = %sink, "Executing converter pipe");

        let mut producer = self
            .command(converter)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| spawn_error(converter, source))?;

        let Some(rows) = producer.stdout.take() else {
            abandon(&mut producer);
            return Err(spawn_error(converter, io::Error::other("stdout was not captured")));
        };

        // The converter's stderr is drained on the side; if nobody reads it a
        // chatty converter blocks on a full pipe while the sink waits for EOF.
        let stderr_drain = producer.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        // The Command (and with it the parent's copy of the pipe) is dropped at
        // the end of this statement, so the converter sees EPIPE if the sink
        // exits early instead of blocking forever.
        let consumer = self
            .command(sink)
            .stdin(Stdio::from(rows))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let consumer = match consumer {
            Ok(child) => child,
            Err(source) => {
                abandon(&mut producer);
                return Err(spawn_error(sink, source));
            },
        };

        let sink_output = consumer
            .wait_with_output()
            .map_err(|source| spawn_error(sink, source))?;
        let converter_status = producer
            .wait()
            .map_err(|source| spawn_error(converter, source))?;
        let converter_stderr = stderr_drain
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !converter_status.success() {
            return Err(failed(
                converter,
                converter_status,
                Vec::new(),
                converter_stderr,
            ));
        }

        check_output(sink, &sink_output)
    }
}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_error(line: &ShellCommand, source: io::Error) -> ToolError {
    ToolError::Spawn {
        command: line.to_string(),
        source,
    }
}

fn check_output(line: &ShellCommand, output: &Output) -> Result<(), ToolError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(failed(
            line,
            output.status,
            output.stdout.clone(),
            output.stderr.clone(),
        ))
    }
}

fn failed(line: &ShellCommand, status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> ToolError {
    ToolError::Failed {
        command: line.to_string(),
        status: status.to_string(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    }
}
