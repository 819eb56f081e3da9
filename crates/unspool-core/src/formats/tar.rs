//! Streaming tar unpacker with nested container support.
//!
//! Entries are processed in stream order. A regular file whose name carries
//! a tar extension, whose content sniffs as tar or tar.gz, and which was
//! found by a task with remaining depth budget is unpacked into a sibling
//! directory on its own thread, under the limiter shared by the whole
//! top-level extraction. The call that consumes a stream never waits for
//! the nested work it scheduled; callers wait on the limiter.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use flate2::read::GzDecoder;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ExtractionError;
use crate::Result;
use crate::UnpackConfig;
use crate::limiter::Limiter;
use crate::report::SharedReport;
use crate::types::EntryKind;
use crate::types::EntryPath;
use crate::types::ExtractionTask;

use super::common::ArchiveEntry;
use super::common::Materialized;
use super::common::ensure_dir;
use super::common::materialize;
use super::detect::FormatTag;
use super::detect::detect_path;

const TAR_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".tar"];

/// Tar and tar.gz unpacker bound to one top-level extraction.
///
/// Clones share the limiter and the report.
#[derive(Debug, Clone)]
pub struct TarUnpacker {
    limiter: Arc<Limiter>,
    report: SharedReport,
    preserve_permissions: bool,
}

impl TarUnpacker {
    /// Creates an unpacker that schedules nested work on `limiter` and
    /// records results in `report`.
    pub fn new(config: &UnpackConfig, limiter: Arc<Limiter>, report: SharedReport) -> Self {
        Self {
            limiter,
            report,
            preserve_permissions: config.preserve_permissions,
        }
    }

    /// Returns the limiter nested tasks are scheduled on.
    pub fn limiter(&self) -> &Arc<Limiter> {
        &self.limiter
    }

    /// Returns the report shared with nested tasks.
    pub fn report(&self) -> &SharedReport {
        &self.report
    }

    /// Opens `task.source`, gzip-decoding it if its content says so, and
    /// unpacks it into `task.dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not a tar container, cannot be
    /// read, or the destination cannot be created.
    pub fn unpack_file(&self, task: &ExtractionTask) -> Result<()> {
        let tag = detect_path(&task.source);
        self.open_and_unpack(task, tag, false)
    }

    /// Unpacks an already decoded tar stream into `task.dest`.
    ///
    /// Returns once `reader` is consumed. Nested containers scheduled along
    /// the way may still be running; call [`Limiter::wait`] on
    /// [`TarUnpacker::limiter`] to wait for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be created or the stream
    /// is corrupt. Failures of individual entries are recorded in the report
    /// instead.
    pub fn unpack_stream<R: Read>(&self, reader: R, task: &ExtractionTask) -> Result<()> {
        self.unpack_stream_inner(reader, task, false)
    }

    fn open_and_unpack(&self, task: &ExtractionTask, tag: FormatTag, holds_admission: bool) -> Result<()> {
        let reader = BufReader::new(File::open(&task.source)?);
        match tag {
            FormatTag::Tar => self.unpack_stream_inner(reader, task, holds_admission),
            FormatTag::TarGz => {
                self.unpack_stream_inner(GzDecoder::new(reader), task, holds_admission)
            }
            _ => Err(ExtractionError::UnsupportedFormat {
                path: task.source.clone(),
            }),
        }
    }

    fn unpack_stream_inner<R: Read>(
        &self,
        reader: R,
        task: &ExtractionTask,
        holds_admission: bool,
    ) -> Result<()> {
        ensure_dir(&task.dest)?;

        let mut archive = tar::Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| ExtractionError::InvalidArchive(format!("unreadable tar stream: {e}")))?;

        for entry in entries {
            let mut entry = entry
                .map_err(|e| ExtractionError::InvalidArchive(format!("corrupt tar entry: {e}")))?;

            let raw = match entry.path() {
                Ok(path) => path.into_owned(),
                Err(err) => {
                    warn!(error = %err, "tar entry with unreadable name");
                    self.report.failure(Path::new("<unnamed tar entry>"), err);
                    continue;
                }
            };
            let path = match EntryPath::parse(&raw) {
                Ok(path) => path,
                Err(err) => {
                    warn!(entry = %raw.display(), "rejecting tar entry outside destination");
                    self.report.failure(&raw, err);
                    continue;
                }
            };
            let kind = EntryKind::from_tar(entry.header().entry_type());
            if path.is_root() && kind.is_directory() {
                continue;
            }

            let nested = kind.is_file() && task.allows_recursion() && has_tar_suffix(path.as_path());
            let mode = entry.header().mode().ok();
            let record = ArchiveEntry {
                path,
                kind,
                mode,
                content: &mut entry,
            };

            match materialize(record, &task.dest, self.preserve_permissions, &self.report) {
                Ok(Materialized::File { path: written, .. }) if nested => {
                    self.schedule_nested(task, &written, holds_admission);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(entry = %raw.display(), error = %err, "tar entry failed");
                    self.report.failure(&raw, err);
                }
            }
        }

        info!(source = %task.source.display(), dest = %task.dest.display(), "tar stream consumed");
        Ok(())
    }

    fn schedule_nested(&self, parent: &ExtractionTask, member: &Path, holds_admission: bool) {
        let tag = detect_path(member);
        if !tag.is_tar_family() {
            debug!(member = %member.display(), %tag, "tar-named member is not a tar container");
            return;
        }
        let Some(dest) = strip_tar_suffix(member) else {
            return;
        };
        let Some(child) = parent.child(member, dest) else {
            return;
        };
        self.report.nested_scheduled();

        // A thread that already holds a slot must not block on the gate.
        let admission = if holds_admission {
            self.limiter.try_acquire()
        } else {
            Some(self.limiter.acquire())
        };

        let Some(admission) = admission else {
            debug!(member = %member.display(), "limiter full, unpacking nested container inline");
            self.run_nested(&child, tag);
            return;
        };

        let ticket = self.limiter.track_start();
        let worker = self.clone();
        let label = member.to_path_buf();
        let spawned = thread::Builder::new()
            .name("untar-nested".into())
            .spawn(move || {
                // Locals drop in reverse: the slot frees before the ticket.
                let _ticket = ticket;
                let _admission = admission;
                worker.run_nested(&child, tag);
            });
        if let Err(err) = spawned {
            warn!(member = %label.display(), error = %err, "failed to spawn nested unpack");
            self.report.failure(&label, err);
        }
    }

    fn run_nested(&self, task: &ExtractionTask, tag: FormatTag) {
        debug!(
            source = %task.source.display(),
            dest = %task.dest.display(),
            depth_budget = task.depth_budget,
            "unpacking nested container"
        );
        if let Err(err) = self.open_and_unpack(task, tag, true) {
            warn!(source = %task.source.display(), error = %err, "nested unpack failed");
            self.report.failure(&task.source, err);
        }
    }
}

fn has_tar_suffix(path: &Path) -> bool {
    tar_suffix_len(path).is_some()
}

fn tar_suffix_len(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let lower = name.to_ascii_lowercase();
    TAR_SUFFIXES
        .iter()
        .find(|suffix| lower.len() > suffix.len() && lower.ends_with(*suffix))
        .map(|suffix| suffix.len())
}

/// Returns the sibling directory a nested container unpacks into:
/// `dir/name.tar` becomes `dir/name`.
pub(crate) fn strip_tar_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let cut = tar_suffix_len(path)?;
    Some(path.with_file_name(&name[..name.len() - cut]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TarTestBuilder;
    use crate::test_utils::create_test_tar;
    use crate::test_utils::gzip_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn unpacker(config: &UnpackConfig) -> TarUnpacker {
        TarUnpacker::new(
            config,
            Arc::new(Limiter::new(config.concurrency)),
            SharedReport::new(),
        )
    }

    #[test]
    fn test_strip_tar_suffix() {
        assert_eq!(
            strip_tar_suffix(Path::new("out/inner.tar")),
            Some(PathBuf::from("out/inner"))
        );
        assert_eq!(
            strip_tar_suffix(Path::new("out/logs.TAR.GZ")),
            Some(PathBuf::from("out/logs"))
        );
        assert_eq!(strip_tar_suffix(Path::new("a.tgz")), Some(PathBuf::from("a")));
        assert_eq!(strip_tar_suffix(Path::new(".tar")), None);
        assert_eq!(strip_tar_suffix(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_unpack_stream_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        let data = TarTestBuilder::new()
            .add_directory("docs/")
            .add_file("docs/a.txt", b"alpha")
            .add_file("b.txt", b"beta")
            .build();
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("mem.tar", temp.path().join("out"), 1);

        tar.unpack_stream(data.as_slice(), &task).unwrap();
        tar.limiter().wait();

        let out = temp.path().join("out");
        assert_eq!(fs::read_to_string(out.join("docs/a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(out.join("b.txt")).unwrap(), "beta");
        let report = tar.report().snapshot();
        assert_eq!(report.files_extracted, 2);
        assert_eq!(report.directories_created, 1);
    }

    #[test]
    fn test_links_are_skipped_with_warning() {
        let temp = TempDir::new().unwrap();
        let data = TarTestBuilder::new()
            .add_file("target.txt", b"x")
            .add_symlink("link", "target.txt")
            .add_hardlink("hard", "target.txt")
            .build();
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("mem.tar", temp.path(), 1);

        tar.unpack_stream(data.as_slice(), &task).unwrap();

        assert!(!temp.path().join("link").exists());
        assert!(!temp.path().join("hard").exists());
        let report = tar.report().snapshot();
        assert_eq!(report.entries_skipped, 2);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_nested_tar_unpacked_into_sibling() {
        let temp = TempDir::new().unwrap();
        let inner = create_test_tar(vec![("inside.txt", b"nested")]);
        let outer = create_test_tar(vec![("inner.tar", inner.as_slice())]);
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("outer.tar", temp.path(), 1);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        assert!(temp.path().join("inner.tar").is_file());
        assert_eq!(
            fs::read_to_string(temp.path().join("inner/inside.txt")).unwrap(),
            "nested"
        );
        assert_eq!(tar.report().snapshot().nested_archives, 1);
    }

    #[test]
    fn test_nested_tar_gz_member() {
        let temp = TempDir::new().unwrap();
        let inner = gzip_bytes(&create_test_tar(vec![("z.txt", b"zipped")]));
        let outer = create_test_tar(vec![("pack.tgz", inner.as_slice())]);
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("outer.tar", temp.path(), 1);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        assert_eq!(fs::read_to_string(temp.path().join("pack/z.txt")).unwrap(), "zipped");
    }

    #[test]
    fn test_recursion_disabled_one_level_down() {
        let temp = TempDir::new().unwrap();
        let deepest = create_test_tar(vec![("leaf.txt", b"leaf")]);
        let inner = create_test_tar(vec![("deepest.tar", deepest.as_slice())]);
        let outer = create_test_tar(vec![("inner.tar", inner.as_slice())]);
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("outer.tar", temp.path(), 1);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        assert!(temp.path().join("inner/deepest.tar").is_file());
        assert!(!temp.path().join("inner/deepest").exists());
    }

    #[test]
    fn test_zero_budget_keeps_members_raw() {
        let temp = TempDir::new().unwrap();
        let inner = create_test_tar(vec![("inside.txt", b"nested")]);
        let outer = create_test_tar(vec![("inner.tar", inner.as_slice())]);
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("outer.tar", temp.path(), 0);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        assert!(temp.path().join("inner.tar").is_file());
        assert!(!temp.path().join("inner").exists());
    }

    #[test]
    fn test_sibling_nested_tars_stay_within_capacity() {
        let temp = TempDir::new().unwrap();
        let members: Vec<(String, Vec<u8>)> = (0..12)
            .map(|i| {
                let body = vec![b'a' + u8::try_from(i).unwrap(); 64 * 1024];
                (format!("part{i}.tar"), create_test_tar(vec![("body.bin", body.as_slice())]))
            })
            .collect();
        let entries: Vec<(&str, &[u8])> = members
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
            .collect();
        let outer = create_test_tar(entries);
        let config = UnpackConfig::default().with_concurrency(3);
        let tar = unpacker(&config);
        let task = ExtractionTask::new("bundle.tar", temp.path(), 1);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        for i in 0..12 {
            assert!(temp.path().join(format!("part{i}/body.bin")).is_file());
        }
        assert!(tar.limiter().peak_in_flight() >= 1);
        assert!(tar.limiter().peak_in_flight() <= 3);
        assert_eq!(tar.limiter().in_flight(), 0);
        assert_eq!(tar.report().snapshot().nested_archives, 12);
    }

    #[test]
    fn test_deeper_budget_with_single_slot() {
        let temp = TempDir::new().unwrap();
        let deepest = create_test_tar(vec![("leaf.txt", b"leaf")]);
        let inner = create_test_tar(vec![("deepest.tar", deepest.as_slice())]);
        let outer = create_test_tar(vec![("inner.tar", inner.as_slice())]);
        let config = UnpackConfig::default().with_concurrency(1);
        let tar = unpacker(&config);
        let task = ExtractionTask::new("outer.tar", temp.path(), 2);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        assert_eq!(
            fs::read_to_string(temp.path().join("inner/deepest/leaf.txt")).unwrap(),
            "leaf"
        );
        assert_eq!(tar.limiter().in_flight(), 0);
    }

    #[test]
    fn test_tar_named_text_is_not_recursed() {
        let temp = TempDir::new().unwrap();
        let outer = create_test_tar(vec![("fake.tar", b"just some text\n")]);
        let tar = unpacker(&UnpackConfig::default());
        let task = ExtractionTask::new("outer.tar", temp.path(), 1);

        tar.unpack_stream(outer.as_slice(), &task).unwrap();
        tar.limiter().wait();

        assert!(temp.path().join("fake.tar").is_file());
        assert!(!temp.path().join("fake").exists());
        assert_eq!(tar.report().snapshot().nested_archives, 0);
    }

    #[test]
    fn test_unpack_file_gzip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("bundle.tar.gz");
        fs::write(&source, gzip_bytes(&create_test_tar(vec![("g.txt", b"gz")]))).unwrap();
        let tar = unpacker(&UnpackConfig::default());

        tar.unpack_file(&ExtractionTask::new(&source, temp.path().join("out"), 1))
            .unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("out/g.txt")).unwrap(), "gz");
    }

    #[test]
    fn test_unpack_file_rejects_non_tar() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("notes.tar");
        fs::write(&source, b"plain words").unwrap();
        let tar = unpacker(&UnpackConfig::default());

        let err = tar
            .unpack_file(&ExtractionTask::new(&source, temp.path().join("out"), 1))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
    }
}
