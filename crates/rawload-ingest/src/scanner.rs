//! Directory listing and new-work detection

use crate::error::{IngestError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// List the regular files in `dir`, skipping the entry named `exclude`.
///
/// Directories are skipped; symlinks count when they point at a file. The
/// result is sorted so processing order is reproducible across runs.
pub fn list_files(dir: &Path, exclude: Option<&str>) -> Result<Vec<String>> {
    let scan_error = |source| IngestError::Scan {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_error)? {
        let entry = entry.map_err(scan_error)?;
        let path = entry.path();

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "Skipping file with a non UTF-8 name");
            continue;
        };

        if exclude == Some(name.as_str()) {
            continue;
        }

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(name),
            Ok(_) => {},
            // Dangling symlink or a file removed while listing
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Skipping vanished or dangling entry");
            },
            Err(source) => return Err(IngestError::Scan { path, source }),
        }
    }

    files.sort();
    Ok(files)
}

/// Directory files that are not yet processed.
///
/// Bag subtraction: each processed entry cancels one matching occurrence in
/// `dir_files`, and the result keeps `dir_files` order. Journals written by
/// older tools may contain a name twice; that only ever cancels two
/// occurrences.
pub fn diff_new_files<S: AsRef<str>>(dir_files: &[String], processed: &[S]) -> Vec<String> {
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for name in processed {
        *remaining.entry(name.as_ref()).or_insert(0) += 1;
    }

    dir_files
        .iter()
        .filter(|name| match remaining.get_mut(name.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            },
            _ => true,
        })
        .cloned()
        .collect()
}
