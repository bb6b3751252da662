//! Per-table staging directory
//!
//! Inputs are unpacked into `<staging_root>/<table>`. The directory is created
//! on demand and reused across runs. Files left behind by earlier runs
//! (unsupported artifacts, or a crash mid-input) are picked up again as
//! artifacts of the next input unless `purge` is called first.

use crate::error::{IngestError, Result};
use crate::scanner::list_files;
use rawload_common::TableName;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(root: &Path, table: &TableName) -> Self {
        Self {
            dir: root.join(table.as_str()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create the staging directory if it does not exist yet
    pub fn prepare(&self) -> Result<()> {
        if !self.dir.is_dir() {
            info!(path = %self.dir.display(), "Creating staging directory");
        }
        fs::create_dir_all(&self.dir).map_err(|source| IngestError::Staging {
            path: self.dir.clone(),
            source,
        })?;
        Ok(())
    }

    /// Remove every regular file in the staging directory.
    ///
    /// Returns how many files were removed.
    pub fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.artifacts()? {
            self.remove_artifact(&path)?;
            removed += 1;
        }
        if removed > 0 {
            info!(path = %self.dir.display(), removed, "Purged staging leftovers");
        }
        Ok(removed)
    }

    /// Regular files currently in the staging directory, sorted by name
    pub fn artifacts(&self) -> Result<Vec<PathBuf>> {
        Ok(list_files(&self.dir, None)?
            .into_iter()
            .map(|name| self.dir.join(name))
            .collect())
    }

    pub fn remove_artifact(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|source| IngestError::Cleanup {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Removed staged artifact");
        Ok(())
    }
}
