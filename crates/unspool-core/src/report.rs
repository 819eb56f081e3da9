//! Extraction reporting.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A non-fatal failure recorded while unpacking one entry or nested task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    /// Entry or nested archive the failure belongs to.
    pub path: PathBuf,
    /// Human-readable cause.
    pub reason: String,
}

/// Report of one top-level extraction, including nested work.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Number of files written.
    pub files_extracted: usize,

    /// Number of directory entries materialized.
    pub directories_created: usize,

    /// Number of nested containers scheduled for extraction.
    pub nested_archives: usize,

    /// Total bytes written to disk.
    pub bytes_written: u64,

    /// Entries skipped because their kind is not materialized.
    pub entries_skipped: usize,

    /// Duration of the extraction.
    pub duration: Duration,

    /// Per-entry and per-nested-task failures.
    pub failures: Vec<EntryFailure>,

    /// Warnings generated during extraction.
    pub warnings: Vec<String>,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a warning message to the report.
    pub fn add_warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Records a failure for `path`.
    pub fn add_failure(&mut self, path: &Path, reason: impl ToString) {
        self.failures.push(EntryFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }

    /// Returns total number of items materialized.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.files_extracted + self.directories_created
    }

    /// Returns whether any failures were recorded.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns whether any warnings were generated.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Report shared between the worker threads of one extraction.
#[derive(Debug, Clone, Default)]
pub struct SharedReport(Arc<Mutex<ExtractionReport>>);

impl SharedReport {
    /// Creates an empty shared report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn file_written(&self, bytes: u64) {
        let mut report = self.0.lock();
        report.files_extracted += 1;
        report.bytes_written = report.bytes_written.saturating_add(bytes);
    }

    pub(crate) fn directory_created(&self) {
        self.0.lock().directories_created += 1;
    }

    pub(crate) fn nested_scheduled(&self) {
        self.0.lock().nested_archives += 1;
    }

    pub(crate) fn skipped(&self, path: &Path, kind: &str) {
        let mut report = self.0.lock();
        report.entries_skipped += 1;
        report.add_warning(format!("skipped {kind} entry {}", path.display()));
    }

    pub(crate) fn failure(&self, path: &Path, reason: impl ToString) {
        self.0.lock().add_failure(path, reason);
    }

    /// Returns a copy of the report as it stands.
    pub fn snapshot(&self) -> ExtractionReport {
        self.0.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report() {
        let report = ExtractionReport::new();
        assert_eq!(report.files_extracted, 0);
        assert_eq!(report.directories_created, 0);
        assert_eq!(report.bytes_written, 0);
        assert!(!report.has_warnings());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_add_failure() {
        let mut report = ExtractionReport::new();
        report.add_failure(Path::new("a/b.txt"), "disk full");
        assert!(report.has_failures());
        assert_eq!(report.failures[0].path, PathBuf::from("a/b.txt"));
        assert_eq!(report.failures[0].reason, "disk full");
    }

    #[test]
    fn test_shared_report_accumulates_across_clones() {
        let shared = SharedReport::new();
        let other = shared.clone();
        shared.file_written(10);
        other.file_written(5);
        other.directory_created();
        other.skipped(Path::new("link"), "symlink");

        let report = shared.snapshot();
        assert_eq!(report.files_extracted, 2);
        assert_eq!(report.bytes_written, 15);
        assert_eq!(report.total_items(), 3);
        assert_eq!(report.entries_skipped, 1);
        assert!(report.has_warnings());
    }
}
