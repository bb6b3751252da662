//! Pipeline configuration
//!
//! A [`PipelineConfig`] is built once at startup (CLI arguments, environment,
//! optional routing file) and handed to the pipeline by value. Nothing reads
//! configuration from globals after that.

use crate::error::{IngestError, Result};
use crate::router::{ExtractMethod, RouteSpec, RoutingTable};
use rawload_common::TableName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// Defaults
// ============================================================================

/// Flag the sink receives origin metadata through
pub const DEFAULT_ORIGIN_FLAG: &str = "-raw-data-file";

/// Staging directories live under the OS temp dir unless configured
pub fn default_staging_root() -> PathBuf {
    std::env::temp_dir()
}

/// Immutable settings for one ingestion run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub table: TableName,
    /// Source directory holding input files and the journal
    pub table_path: PathBuf,
    pub staging_root: PathBuf,
    /// Sink command template; `{table}` is substituted
    pub sink: String,
    pub routing: RoutingTable,
    /// Stop after the first completed input
    pub single_file: bool,
    /// Pass `<origin_flag>=<input>:<artifact>` to the sink
    pub inject_origin: bool,
    pub origin_flag: String,
    /// Remove staging leftovers before the first input
    pub purge_staging: bool,
}

impl PipelineConfig {
    pub fn builder(
        table: TableName,
        table_path: impl Into<PathBuf>,
        sink: impl Into<String>,
    ) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: PipelineConfig {
                table,
                table_path: table_path.into(),
                staging_root: default_staging_root(),
                sink: sink.into(),
                routing: RoutingTable::default(),
                single_file: false,
                inject_origin: false,
                origin_flag: DEFAULT_ORIGIN_FLAG.to_string(),
                purge_staging: false,
            },
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.table_path.join(crate::journal::JOURNAL_FILE_NAME)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_root.join(self.table.as_str())
    }

    /// Check the settings before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.table_path.is_dir() {
            return Err(IngestError::config(format!(
                "table path {} is not a directory",
                self.table_path.display()
            )));
        }

        self.check_staging_outside_source()?;

        if self.sink.trim().is_empty() {
            return Err(IngestError::config("sink command cannot be empty"));
        }

        if self.inject_origin && self.origin_flag.trim().is_empty() {
            return Err(IngestError::config(
                "origin flag cannot be empty when origin injection is enabled",
            ));
        }

        Ok(())
    }

    /// Staging artifacts are deleted after loading, so the staging directory
    /// must not be, contain or sit inside the source directory.
    fn check_staging_outside_source(&self) -> Result<()> {
        let staging_dir = self.staging_dir();
        let source = resolve_path(&self.table_path).map_err(|e| {
            IngestError::config(format!(
                "cannot resolve table path {}: {}",
                self.table_path.display(),
                e
            ))
        })?;
        let staging = resolve_path(&staging_dir).map_err(|e| {
            IngestError::config(format!(
                "cannot resolve staging directory {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        if staging.starts_with(&source) || source.starts_with(&staging) {
            return Err(IngestError::config(format!(
                "staging directory {} overlaps table path {}",
                staging.display(),
                source.display()
            )));
        }

        Ok(())
    }
}

/// Canonical form of `path`, which may not exist yet: the nearest existing
/// ancestor is canonicalized and the missing components are appended
fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                missing.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            },
            Err(e) => return Err(e),
        }
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.staging_root = root.into();
        self
    }

    pub fn routing(mut self, routing: RoutingTable) -> Self {
        self.config.routing = routing;
        self
    }

    pub fn single_file(mut self, enabled: bool) -> Self {
        self.config.single_file = enabled;
        self
    }

    pub fn inject_origin(mut self, enabled: bool) -> Self {
        self.config.inject_origin = enabled;
        self
    }

    pub fn origin_flag(mut self, flag: impl Into<String>) -> Self {
        self.config.origin_flag = flag.into();
        self
    }

    pub fn purge_staging(mut self, enabled: bool) -> Self {
        self.config.purge_staging = enabled;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

// ============================================================================
// Routing file
// ============================================================================

/// Contents of a TOML routing file
///
/// ```toml
/// [extract]
/// rar = { method = "command", command = "unrar e -o+ {input} {dest}/" }
///
/// [routes]
/// txt = { action = "discard" }
///
/// [tables.IMP_INDIA.routes]
/// mdb = { action = "convert", command = "mdb-export {input} import" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingFile {
    #[serde(default)]
    pub extract: BTreeMap<String, ExtractMethod>,

    #[serde(default)]
    pub routes: BTreeMap<String, RouteSpec>,

    /// Per-table overrides, applied after the global tables
    #[serde(default)]
    pub tables: BTreeMap<String, TableOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableOverrides {
    #[serde(default)]
    pub extract: BTreeMap<String, ExtractMethod>,

    #[serde(default)]
    pub routes: BTreeMap<String, RouteSpec>,
}

impl RoutingFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| IngestError::RoutingRead {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| IngestError::RoutingParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default routing, overlaid with the global entries and then with the
    /// entries for `table`
    pub fn routing_for(&self, table: &TableName) -> RoutingTable {
        let mut routing = RoutingTable::default();
        routing.merge(&self.extract, &self.routes);

        if let Some(overrides) = self.tables.get(table.as_str()) {
            routing.merge(&overrides.extract, &overrides.routes);
        }

        routing
    }
}
