//! Concurrent ZIP unpacker.
//!
//! The central directory is parsed once; every entry is then extracted on
//! its own worker thread holding a clone of the parsed archive. Clones share
//! metadata and the open file handle (see [`SharedFile`]), so workers never
//! re-open the archive. Admission is bounded by a limiter dedicated to this
//! call; zip members are never unpacked recursively.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::debug;
use tracing::info;
use tracing::warn;
use zip::ZipArchive;

use crate::ExtractionReport;
use crate::Result;
use crate::UnpackConfig;
use crate::io::SharedFile;
use crate::limiter::Limiter;
use crate::report::SharedReport;
use crate::types::EntryKind;
use crate::types::EntryPath;

use super::common::ArchiveEntry;
use super::common::ensure_dir;
use super::common::materialize;

/// ZIP unpacker.
#[derive(Debug, Clone)]
pub struct ZipUnpacker {
    concurrency: usize,
    preserve_permissions: bool,
}

impl ZipUnpacker {
    /// Creates an unpacker using the concurrency and permission settings of
    /// `config`.
    #[must_use]
    pub fn new(config: &UnpackConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            preserve_permissions: config.preserve_permissions,
        }
    }

    /// Extracts every entry of the zip at `source` into `dest`.
    ///
    /// Returns once every entry has been written or has recorded a failure
    /// in the report. Only container-level problems (unreadable file,
    /// corrupt central directory, unwritable destination) are errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unspool_core::UnpackConfig;
    /// use unspool_core::formats::ZipUnpacker;
    ///
    /// let unpacker = ZipUnpacker::new(&UnpackConfig::default());
    /// let report = unpacker.unpack("inbox/photos.zip".as_ref(), "out".as_ref())?;
    /// println!("{} files", report.files_extracted);
    /// # Ok::<(), unspool_core::ExtractionError>(())
    /// ```
    pub fn unpack(&self, source: &Path, dest: &Path) -> Result<ExtractionReport> {
        self.unpack_shared(SharedFile::open(source)?, dest)
    }

    /// Extracts an already opened zip file.
    pub fn unpack_shared(&self, file: SharedFile, dest: &Path) -> Result<ExtractionReport> {
        let started = Instant::now();
        let archive = ZipArchive::new(file)?;
        ensure_dir(dest)?;

        let limiter = Arc::new(Limiter::new(self.concurrency));
        let report = SharedReport::new();
        let dest: Arc<Path> = Arc::from(dest);

        for index in 0..archive.len() {
            let admission = limiter.acquire();
            let ticket = limiter.track_start();
            let mut archive = archive.clone();
            let worker_report = report.clone();
            let dest = Arc::clone(&dest);
            let preserve = self.preserve_permissions;

            let spawned = thread::Builder::new()
                .name(format!("unzip-{index}"))
                .spawn(move || {
                    // Locals drop in reverse: the slot frees before the ticket.
                    let _ticket = ticket;
                    let _admission = admission;
                    unpack_entry(&mut archive, index, &dest, preserve, &worker_report);
                });
            // On spawn failure the closure, and with it both guards, is dropped.
            if let Err(err) = spawned {
                warn!(index, error = %err, "failed to spawn zip worker");
                report.failure(&entry_label(index), err);
            }
        }

        limiter.wait();

        let mut report = report.snapshot();
        report.duration = started.elapsed();
        info!(
            dest = %dest.display(),
            files = report.files_extracted,
            failures = report.failures.len(),
            peak_workers = limiter.peak_in_flight(),
            "zip extracted"
        );
        Ok(report)
    }
}

fn entry_label(index: usize) -> PathBuf {
    PathBuf::from(format!("<zip entry #{index}>"))
}

fn unpack_entry(
    archive: &mut ZipArchive<SharedFile>,
    index: usize,
    dest: &Path,
    preserve_permissions: bool,
    report: &SharedReport,
) {
    let mut file = match archive.by_index(index) {
        Ok(file) => file,
        Err(err) => {
            warn!(index, error = %err, "cannot open zip entry");
            report.failure(&entry_label(index), err);
            return;
        }
    };
    let raw = PathBuf::from(file.name());

    let path = match EntryPath::parse(&raw) {
        Ok(path) => path,
        Err(err) => {
            warn!(entry = %raw.display(), "rejecting zip entry outside destination");
            report.failure(&raw, err);
            return;
        }
    };
    let kind = if file.is_dir() {
        EntryKind::Directory
    } else if file.is_symlink() {
        EntryKind::Other("symlink")
    } else {
        EntryKind::File
    };
    let mode = file.unix_mode();

    let entry = ArchiveEntry {
        path,
        kind,
        mode,
        content: &mut file,
    };
    match materialize(entry, dest, preserve_permissions, report) {
        Ok(_) => debug!(entry = %raw.display(), "zip entry done"),
        Err(err) => {
            warn!(entry = %raw.display(), error = %err, "zip entry failed");
            report.failure(&raw, err);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::ZipTestBuilder;
    use crate::test_utils::create_test_zip;
    use std::fs;
    use tempfile::TempDir;

    fn write_zip(temp: &TempDir, data: &[u8]) -> PathBuf {
        let path = temp.path().join("input.zip");
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_unpack_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let data = ZipTestBuilder::new()
            .add_directory("a/")
            .add_file("a/b.txt", b"hi")
            .build();
        let source = write_zip(&temp, &data);
        let dest = temp.path().join("out");

        let report = ZipUnpacker::new(&UnpackConfig::default())
            .unpack(&source, &dest)
            .unwrap();

        assert!(dest.join("a").is_dir());
        assert_eq!(fs::read_to_string(dest.join("a/b.txt")).unwrap(), "hi");
        assert_eq!(report.files_extracted, 1);
        assert_eq!(report.directories_created, 1);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_many_entries_with_small_capacity() {
        let temp = TempDir::new().unwrap();
        let names: Vec<String> = (0..50).map(|i| format!("d{}/f{i}.txt", i % 5)).collect();
        let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), n.as_bytes())).collect();
        let source = write_zip(&temp, &create_test_zip(entries));
        let dest = temp.path().join("out");

        let config = UnpackConfig::default().with_concurrency(2);
        let report = ZipUnpacker::new(&config).unpack(&source, &dest).unwrap();

        assert_eq!(report.files_extracted, 50);
        for name in &names {
            assert_eq!(fs::read_to_string(dest.join(name)).unwrap(), *name);
        }
    }

    #[test]
    fn test_unsafe_entry_does_not_abort_siblings() {
        let temp = TempDir::new().unwrap();
        let data = create_test_zip(vec![("../escape.txt", b"bad"), ("ok.txt", b"good")]);
        let source = write_zip(&temp, &data);
        let dest = temp.path().join("out");

        let report = ZipUnpacker::new(&UnpackConfig::default())
            .unpack(&source, &dest)
            .unwrap();

        assert_eq!(fs::read_to_string(dest.join("ok.txt")).unwrap(), "good");
        assert!(!temp.path().join("escape.txt").exists());
        assert_eq!(report.files_extracted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("../escape.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unpack_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let data = ZipTestBuilder::new()
            .add_file_with_mode("run.sh", b"#!/bin/sh\n", 0o755)
            .build();
        let source = write_zip(&temp, &data);
        let dest = temp.path().join("out");

        ZipUnpacker::new(&UnpackConfig::default())
            .unpack(&source, &dest)
            .unwrap();

        let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_entry_skipped() {
        let temp = TempDir::new().unwrap();
        let data = ZipTestBuilder::new()
            .add_file("real.txt", b"data")
            .add_symlink("link", "real.txt")
            .build();
        let source = write_zip(&temp, &data);
        let dest = temp.path().join("out");

        let report = ZipUnpacker::new(&UnpackConfig::default())
            .unpack(&source, &dest)
            .unwrap();

        assert!(fs::symlink_metadata(dest.join("link")).is_err());
        assert_eq!(report.entries_skipped, 1);
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        let temp = TempDir::new().unwrap();
        let source = write_zip(&temp, b"PK\x03\x04 definitely not a zip");
        let result = ZipUnpacker::new(&UnpackConfig::default()).unpack(&source, temp.path());
        assert!(result.is_err());
    }
}
