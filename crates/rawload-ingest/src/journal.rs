//! Processed-file journal (`journal.txt`)
//!
//! The journal is the single source of truth for "done": one line per entry,
//! `#` lines are comments (run markers), every other line is the exact name of
//! an input file whose artifacts have all been drained. It lives next to the
//! input files in the table directory.

use crate::error::{IngestError, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// File name of the journal inside a table directory
pub const JOURNAL_FILE_NAME: &str = "journal.txt";

/// Format of run marker comments, e.g. `# 2024-01-01 00:00:00`
pub const RUN_MARKER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One line of the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// Comment line, stored verbatim. Blank lines are kept as comments so
    /// they survive a rewrite without ever matching a file.
    Comment(String),
    /// Name of a fully processed input file
    File(String),
}

impl JournalEntry {
    pub fn parse(line: &str) -> Self {
        if line.starts_with('#') || line.trim().is_empty() {
            JournalEntry::Comment(line.to_string())
        } else {
            JournalEntry::File(line.to_string())
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            JournalEntry::File(name) => Some(name),
            JournalEntry::Comment(_) => None,
        }
    }
}

impl std::fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalEntry::Comment(line) | JournalEntry::File(line) => f.write_str(line),
        }
    }
}

/// Ordered, append-only record of processed input files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the journal at `path`.
    ///
    /// A missing file is a fresh table and yields an empty journal. Any other
    /// read failure is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let journal = Self::parse(&content);
                debug!(
                    path = %path.display(),
                    entries = journal.len(),
                    "Loaded journal"
                );
                Ok(journal)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No journal yet, starting with an empty one");
                Ok(Self::new())
            },
            Err(source) => Err(IngestError::JournalRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(content: &str) -> Self {
        Self {
            entries: content.lines().map(JournalEntry::parse).collect(),
        }
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of processed files; duplicates collapse
    pub fn filenames(&self) -> BTreeSet<&str> {
        self.entries.iter().filter_map(JournalEntry::file_name).collect()
    }

    /// Filename entries in journal order, duplicates included
    pub fn filename_entries(&self) -> Vec<&str> {
        self.entries.iter().filter_map(JournalEntry::file_name).collect()
    }

    /// Whether `name` reads back as the same filename entry once written.
    ///
    /// Names starting with `#` or made of whitespace would parse as comments,
    /// and line breaks would split the entry in two.
    pub fn can_record(name: &str) -> bool {
        !name.trim().is_empty()
            && !name.starts_with('#')
            && !name.contains(['\n', '\r'])
    }

    /// Record `name` as processed. In memory only; see [`Journal::persist`].
    pub fn append_file(&mut self, name: impl Into<String>) {
        self.entries.push(JournalEntry::File(name.into()));
    }

    /// Append a comment line, adding the `# ` prefix when missing
    pub fn append_comment(&mut self, text: &str) {
        let line = if text.starts_with('#') {
            text.to_string()
        } else {
            format!("# {}", text)
        };
        self.entries.push(JournalEntry::Comment(line));
    }

    /// Append the timestamp comment that marks the start of a run
    pub fn append_run_marker(&mut self, started_at: NaiveDateTime) {
        self.append_comment(&started_at.format(RUN_MARKER_FORMAT).to_string());
    }

    /// Journal text, one entry per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    /// Replace the journal at `path` with the full entry sequence.
    ///
    /// Writes a temporary file in the same directory, syncs it and renames it
    /// over `path`, so a crash leaves either the old or the new journal.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_error(path, e))?;
        tmp.write_all(self.render().as_bytes())
            .map_err(|e| write_error(path, e))?;
        copy_permissions(path, &tmp).map_err(|e| write_error(path, e))?;
        tmp.as_file().sync_all().map_err(|e| write_error(path, e))?;
        tmp.persist(path).map_err(|e| write_error(path, e.error))?;
        sync_dir(dir).map_err(|e| write_error(path, e))?;

        debug!(path = %path.display(), entries = self.len(), "Persisted journal");
        Ok(())
    }
}

fn write_error(path: &Path, source: io::Error) -> IngestError {
    IngestError::JournalWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Keep the mode of the journal being replaced (temp files are created 0600)
fn copy_permissions(target: &Path, tmp: &NamedTempFile) -> io::Result<()> {
    match fs::metadata(target) {
        Ok(meta) => fs::set_permissions(tmp.path(), meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => default_permissions(tmp),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn default_permissions(tmp: &NamedTempFile) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(_tmp: &NamedTempFile) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn marker_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::load(&temp.path().join(JOURNAL_FILE_NAME)).unwrap();
        assert!(journal.is_empty());
        assert!(journal.filenames().is_empty());
    }

    #[test]
    fn test_unreadable_journal_is_an_error() {
        let temp = TempDir::new().unwrap();
        // A directory where the journal should be cannot be read as text
        let path = temp.path().join(JOURNAL_FILE_NAME);
        fs::create_dir(&path).unwrap();

        let err = Journal::load(&path).unwrap_err();
        assert!(matches!(err, IngestError::JournalRead { .. }));
    }

    #[test]
    fn test_comment_lines_are_not_filenames() {
        let journal = Journal::parse("# 2024-01-01 00:00:00\nfileA.zip\n");
        let names: Vec<_> = journal.filenames().into_iter().collect();
        assert_eq!(names, vec!["fileA.zip"]);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_blank_lines_never_match() {
        let journal = Journal::parse("a.zip\n\n   \nb.zip\n");
        assert_eq!(journal.filename_entries(), vec!["a.zip", "b.zip"]);
        assert_eq!(journal.render(), "a.zip\n\n   \nb.zip\n");
    }

    #[test]
    fn test_duplicates_collapse_in_set_but_not_in_entries() {
        let journal = Journal::parse("a.zip\nb.zip\na.zip\n");
        assert_eq!(journal.filenames().len(), 2);
        assert_eq!(journal.filename_entries(), vec!["a.zip", "b.zip", "a.zip"]);
    }

    #[test]
    fn test_can_record_only_names_that_read_back() {
        for name in ["a.zip", " spaced name.xls", "report#2.xls", "x"] {
            assert!(Journal::can_record(name), "{:?}", name);

            let mut journal = Journal::new();
            journal.append_file(name);
            assert_eq!(Journal::parse(&journal.render()).filename_entries(), vec![name]);
        }

        for name in ["#report.xls", "", "   ", "evil\nvictim.xls", "tail.xls\r", "a\rb.xls"] {
            assert!(!Journal::can_record(name), "{:?}", name);
        }
    }

    #[test]
    fn test_crlf_lines() {
        let journal = Journal::parse("# marker\r\nfileA.zip\r\n");
        assert_eq!(journal.filename_entries(), vec!["fileA.zip"]);
    }

    #[test]
    fn test_run_marker_format() {
        let mut journal = Journal::new();
        journal.append_run_marker(marker_time());
        journal.append_comment("manual note");
        assert_eq!(journal.render(), "# 2024-01-01 00:00:00\n# manual note\n");
        assert!(journal.filenames().is_empty());
    }

    #[test]
    fn test_append_does_not_touch_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(JOURNAL_FILE_NAME);

        let mut journal = Journal::load(&path).unwrap();
        journal.append_file("a.zip");

        assert!(!path.exists());
    }

    #[test]
    fn test_persist_and_reload_preserves_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(JOURNAL_FILE_NAME);

        let mut journal = Journal::new();
        journal.append_run_marker(marker_time());
        journal.append_file("b.rar");
        journal.append_file("a.zip");
        journal.persist(&path).unwrap();

        let reloaded = Journal::load(&path).unwrap();
        assert_eq!(reloaded, journal);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# 2024-01-01 00:00:00\nb.rar\na.zip\n"
        );
    }

    #[test]
    fn test_persist_overwrites_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(JOURNAL_FILE_NAME);
        fs::write(&path, "old.zip\n").unwrap();

        let mut journal = Journal::load(&path).unwrap();
        journal.append_file("new.zip");
        journal.persist(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old.zip\nnew.zip\n");
        let files: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join(JOURNAL_FILE_NAME);
        fs::write(&path, "old.zip\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        Journal::load(&path).unwrap().persist(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone").join(JOURNAL_FILE_NAME);

        let err = Journal::new().persist(&path).unwrap_err();
        assert!(matches!(err, IngestError::JournalWrite { .. }));
    }
}
