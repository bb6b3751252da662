//! Built-in archive extraction
//!
//! # Supported Formats
//!
//! - **Zip** (.zip): Using the zip crate
//! - **Tar.gz** (.tgz, .tar.gz): flate2 + tar
//! - **Copy**: a flat file is its own artifact
//!
//! Archives are unpacked *flat*: only the file name of each entry is kept, so
//! `2024/jan/data.mdb` lands as `<dest>/data.mdb`. A later entry with the same
//! name overwrites an earlier one. Directory entries, links and names that do
//! not end in a normal path component are skipped.
//!
//! Entries are streamed straight from disk to disk; nothing is buffered whole.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Unpack every file of the ZIP archive `archive` into `dest`
pub fn extract_zip(archive: &Path, dest: &Path) -> io::Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut zip =
        zip::ZipArchive::new(file).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut written = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if entry.is_dir() {
            continue;
        }

        let Some(target) = flat_target(dest, Path::new(entry.name())) else {
            debug!(entry = entry.name(), "Skipping zip entry without a file name");
            continue;
        };

        let mut out = File::create(&target)?;
        let bytes = io::copy(&mut entry, &mut out)?;
        debug!(entry = entry.name(), bytes, "Extracted zip entry");
        written.push(target);
    }

    Ok(written)
}

/// Unpack every regular file of the gzip-compressed tar `archive` into `dest`
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> io::Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut written = Vec::new();

    for entry in tar.entries()? {
        let mut entry = entry?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(target) = flat_target(dest, &path) else {
            debug!(entry = %path.display(), "Skipping tar entry without a file name");
            continue;
        };

        let mut out = File::create(&target)?;
        let bytes = io::copy(&mut entry, &mut out)?;
        debug!(entry = %path.display(), bytes, "Extracted tar entry");
        written.push(target);
    }

    Ok(written)
}

/// Copy `input` into `dest` under its own name
pub fn copy_into(input: &Path, dest: &Path) -> io::Result<Vec<PathBuf>> {
    let target = flat_target(dest, input).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", input.display()),
        )
    })?;

    fs::copy(input, &target)?;
    Ok(vec![target])
}

/// `dest/<last component of entry>` when that component is a plain name
fn flat_target(dest: &Path, entry: &Path) -> Option<PathBuf> {
    match entry.components().next_back()? {
        Component::Normal(name) => Some(dest.join(name)),
        _ => None,
    }
}
