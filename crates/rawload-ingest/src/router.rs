//! File-type routing
//!
//! Two extension tables decide what happens to a file:
//!
//! - the **extract** table, keyed by the extension of an *input* file, picks
//!   how it is unpacked into the staging directory;
//! - the **routes** table, keyed by the extension of a *staged artifact*,
//!   picks whether it is converted and loaded, or discarded.
//!
//! Artifacts whose extension has no route are unsupported: they are logged and
//! left in staging. Extensions match case-insensitively and the longest
//! configured suffix wins, so `tar.gz` beats `gz`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an input file is unpacked into the staging directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum ExtractMethod {
    /// Built-in ZIP extraction, entry paths flattened to file names
    Zip,
    /// Built-in gzip-compressed tar extraction, flattened
    TarGz,
    /// The input is its own single artifact
    Copy,
    /// External extractor; `{input}` and `{dest}` are substituted
    Command { command: String },
}

impl std::fmt::Display for ExtractMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractMethod::Zip => write!(f, "zip"),
            ExtractMethod::TarGz => write!(f, "tar-gz"),
            ExtractMethod::Copy => write!(f, "copy"),
            ExtractMethod::Command { command } => write!(f, "command `{}`", command),
        }
    }
}

/// Configured action for a staged artifact extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RouteSpec {
    /// Run `command` (`{input}` and `{table}` substituted) and stream its
    /// stdout into the sink
    Convert { command: String },
    /// Delete without converting
    Discard,
}

/// Result of classifying one staged artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    ConvertAndLoad { converter: &'a str },
    Discard,
    Unsupported,
}

pub const MDB_EXPORT: &str = "mdb-export {input} $(mdb-tables {input})";
pub const SSCONVERT_CSV: &str = "ssconvert --export-type=Gnumeric_stf:stf_csv {input} fd://1";
pub const UNRAR: &str = "unrar e -o+ {input} {dest}/";

/// Extension tables for one table's run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    extract: BTreeMap<String, ExtractMethod>,
    routes: BTreeMap<String, RouteSpec>,
}

impl RoutingTable {
    /// A table with no entries: nothing is extracted, everything is unsupported
    pub fn empty() -> Self {
        Self {
            extract: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }

    pub fn with_extract(mut self, extension: &str, method: ExtractMethod) -> Self {
        self.set_extract(extension, method);
        self
    }

    pub fn with_route(mut self, extension: &str, route: RouteSpec) -> Self {
        self.set_route(extension, route);
        self
    }

    pub fn set_extract(&mut self, extension: &str, method: ExtractMethod) {
        self.extract.insert(normalize_extension(extension), method);
    }

    pub fn set_route(&mut self, extension: &str, route: RouteSpec) {
        self.routes.insert(normalize_extension(extension), route);
    }

    /// Overlay `extract` and `routes` entries; keys present there win
    pub fn merge(
        &mut self,
        extract: &BTreeMap<String, ExtractMethod>,
        routes: &BTreeMap<String, RouteSpec>,
    ) {
        for (ext, method) in extract {
            self.set_extract(ext, method.clone());
        }
        for (ext, route) in routes {
            self.set_route(ext, route.clone());
        }
    }

    /// How to unpack the input file `file_name`, if it is unpackable at all
    pub fn extract_method(&self, file_name: &str) -> Option<&ExtractMethod> {
        match_extension(&self.extract, file_name).map(|(_, method)| method)
    }

    /// Decide what to do with the staged artifact `file_name`
    pub fn classify(&self, file_name: &str) -> Route<'_> {
        match match_extension(&self.routes, file_name) {
            Some((_, RouteSpec::Convert { command })) => Route::ConvertAndLoad { converter: command },
            Some((_, RouteSpec::Discard)) => Route::Discard,
            None => Route::Unsupported,
        }
    }
}

impl Default for RoutingTable {
    /// The routing the ingestion hosts have always used
    fn default() -> Self {
        let convert = |command: &str| RouteSpec::Convert {
            command: command.to_string(),
        };

        Self::empty()
            .with_extract("zip", ExtractMethod::Zip)
            .with_extract("tgz", ExtractMethod::TarGz)
            .with_extract("tar.gz", ExtractMethod::TarGz)
            .with_extract(
                "rar",
                ExtractMethod::Command {
                    command: UNRAR.to_string(),
                },
            )
            .with_extract("mdb", ExtractMethod::Copy)
            .with_extract("accdb", ExtractMethod::Copy)
            .with_extract("xls", ExtractMethod::Copy)
            .with_extract("xlsx", ExtractMethod::Copy)
            .with_route("mdb", convert(MDB_EXPORT))
            .with_route("accdb", convert(MDB_EXPORT))
            .with_route("xls", convert(SSCONVERT_CSV))
            .with_route("xlsx", convert(SSCONVERT_CSV))
            // Nested archives and readme files ship alongside the data
            .with_route("zip", RouteSpec::Discard)
            .with_route("txt", RouteSpec::Discard)
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Find the longest key of `table` that is an extension of `file_name`.
///
/// A key matches when the name ends with `.<key>` and something precedes the
/// dot, so a bare `.zip` file has no extension.
pub fn match_extension<'a, V>(
    table: &'a BTreeMap<String, V>,
    file_name: &str,
) -> Option<(&'a str, &'a V)> {
    let name = file_name.to_lowercase();

    table
        .iter()
        .filter(|(ext, _)| {
            !ext.is_empty()
                && name.len() > ext.len() + 1
                && name.ends_with(ext.as_str())
                && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
        })
        .max_by_key(|(ext, _)| ext.len())
        .map(|(ext, value)| (ext.as_str(), value))
}
