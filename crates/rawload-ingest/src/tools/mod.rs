//! External tool capabilities
//!
//! The pipeline never spawns processes itself. It talks to a [`Toolbox`],
//! which unpacks inputs and runs converter → sink pipes. [`SystemToolbox`]
//! does this with real processes; tests substitute an in-memory fake.
//!
//! Converter, sink and command-based extractor invocations are shell command
//! templates. Placeholders (`{input}`, `{dest}`, `{table}`) are replaced with
//! shell-quoted values, so paths with spaces or quotes are safe.

pub mod archive;
pub mod system;

pub use system::SystemToolbox;

use crate::error::ToolError;
use crate::router::ExtractMethod;
use std::path::Path;

/// Capability interface for the extractor, converter and sink
pub trait Toolbox {
    /// Unpack `input` into `dest`, overwriting files with the same name
    fn extract(&self, method: &ExtractMethod, input: &Path, dest: &Path) -> Result<(), ToolError>;

    /// Run `converter` with its stdout streamed into the stdin of `sink`.
    ///
    /// Fails if either side fails.
    fn convert_and_load(&self, converter: &ShellCommand, sink: &ShellCommand)
        -> Result<(), ToolError>;
}

impl<T: Toolbox + ?Sized> Toolbox for &T {
    fn extract(&self, method: &ExtractMethod, input: &Path, dest: &Path) -> Result<(), ToolError> {
        (**self).extract(method, input, dest)
    }

    fn convert_and_load(
        &self,
        converter: &ShellCommand,
        sink: &ShellCommand,
    ) -> Result<(), ToolError> {
        (**self).convert_and_load(converter, sink)
    }
}

/// A rendered command line, executed with `sh -c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand(String);

impl ShellCommand {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    /// Substitute `{name}` placeholders with shell-quoted values.
    ///
    /// Single pass, so a substituted value is never scanned again. Unknown
    /// placeholders (and shell `${VAR}` expansions) are left untouched.
    pub fn render(template: &str, vars: &[(&str, &str)]) -> Self {
        let mut line = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            line.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            let known = after.find('}').and_then(|end| {
                let name = &after[..end];
                vars.iter()
                    .find(|(var, _)| *var == name)
                    .map(|(_, value)| (end, *value))
            });

            match known {
                Some((end, value)) => {
                    line.push_str(&shell_quote(value));
                    rest = &after[end + 1..];
                },
                None => {
                    line.push('{');
                    rest = after;
                },
            }
        }

        line.push_str(rest);
        Self(line)
    }

    /// Insert `<flag>=<value>` before the last word of the command line.
    ///
    /// Loaders take the target collection as their final argument, so
    /// metadata flags go right before it. A single-word command gets the flag
    /// appended.
    pub fn with_flag_before_last(&self, flag: &str, value: &str) -> Self {
        let arg = format!("{}={}", flag, shell_quote(value));
        let line = self.0.trim_end();

        match line.rfind(char::is_whitespace) {
            Some(idx) if !line[..idx].trim().is_empty() => {
                let (head, last) = line.split_at(idx + 1);
                Self(format!("{}{} {}", head, arg, last))
            },
            _ => Self(format!("{} {}", line, arg)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote `value` for a POSIX shell; plain words are left as they are
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));

    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
