//! Entry materialization shared by the zip and tar unpackers.
//!
//! Both unpackers reduce every container record to an [`ArchiveEntry`] and
//! hand it to [`materialize`], which owns the filesystem side: idempotent
//! directory creation, buffered file writes and mode bits.

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::Result;
use crate::error::is_benign_io;
use crate::report::SharedReport;
use crate::types::EntryKind;
use crate::types::EntryPath;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// One record inside a container, consumed exactly once.
#[derive(Debug)]
pub struct ArchiveEntry<R> {
    /// Validated path relative to the destination.
    pub path: EntryPath,
    /// Entry kind.
    pub kind: EntryKind,
    /// Mode bits recorded in the container, if any.
    pub mode: Option<u32>,
    /// Entry content.
    pub content: R,
}

/// What [`materialize`] produced for an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// A regular file was written.
    File {
        /// Absolute output path.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A directory exists at the output path.
    Directory(PathBuf),
    /// The entry kind is not materialized.
    Skipped,
}

/// Writes `entry` under `dest` and records the outcome in `report`.
///
/// # Errors
///
/// Returns an error if directory creation, file creation, the content copy
/// or applying mode bits fails. Concurrent "already exists" races on
/// directories are not errors.
pub fn materialize<R: Read>(
    entry: ArchiveEntry<R>,
    dest: &Path,
    preserve_permissions: bool,
    report: &SharedReport,
) -> Result<Materialized> {
    let ArchiveEntry {
        path,
        kind,
        mode,
        mut content,
    } = entry;
    let output = path.resolve(dest);

    match kind {
        EntryKind::Directory => {
            ensure_dir(&output)?;
            report.directory_created();
            Ok(Materialized::Directory(output))
        }
        EntryKind::File => {
            let mode = mode.filter(|_| preserve_permissions);
            let bytes = write_file(&mut content, &output, mode)?;
            debug!(path = %output.display(), bytes, "wrote entry");
            report.file_written(bytes);
            Ok(Materialized::File {
                path: output,
                bytes,
            })
        }
        EntryKind::Other(what) => {
            debug!(path = %path.as_path().display(), kind = what, "skipping entry");
            report.skipped(path.as_path(), what);
            Ok(Materialized::Skipped)
        }
    }
}

/// Creates `path` and its parents, treating a concurrent create as success.
///
/// # Errors
///
/// Returns an error if the directory cannot be created and does not exist
/// afterwards.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if is_benign_io(&err) && path.is_dir() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Streams `reader` into a fresh file at `output`, creating parents first.
///
/// # Errors
///
/// Returns an error if any filesystem operation or the copy fails.
pub fn write_file<R: Read>(reader: &mut R, output: &Path, mode: Option<u32>) -> io::Result<u64> {
    if let Some(parent) = output.parent() {
        ensure_dir(parent)?;
    }

    let file = File::create(output)?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let bytes = io::copy(reader, &mut writer)?;
    writer.flush()?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(output, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(bytes)
}
