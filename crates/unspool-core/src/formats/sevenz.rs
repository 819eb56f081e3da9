//! 7z delegate backed by `sevenz-rust2`.
//!
//! Entries are validated and written by the same code the zip and tar
//! unpackers use; the library only decodes. Encrypted archives are not
//! supported (no password is ever supplied).

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;

use crate::Result;
use crate::report::SharedReport;
use crate::types::EntryKind;
use crate::types::EntryPath;

use super::common::ArchiveEntry;
use super::common::ensure_dir;
use super::common::materialize;
use super::traits::DelegatedUnpacker;

/// In-process 7z unpacker.
#[derive(Debug, Clone, Default)]
pub struct SevenZUnpacker;

impl SevenZUnpacker {
    /// Creates the unpacker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DelegatedUnpacker for SevenZUnpacker {
    fn unpack(&self, source: &Path, dest: &Path) -> Result<()> {
        ensure_dir(dest)?;
        let reader = BufReader::new(File::open(source)?);
        let report = SharedReport::new();

        let extract_fn = |entry: &sevenz_rust2::ArchiveEntry,
                          content: &mut dyn Read,
                          _dest: &PathBuf|
         -> std::result::Result<bool, sevenz_rust2::Error> {
            let path = EntryPath::parse(Path::new(&entry.name))
                .map_err(|e| sevenz_rust2::Error::Other(e.to_string().into()))?;
            let kind = if entry.is_directory() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let record = ArchiveEntry {
                path,
                kind,
                mode: None,
                content,
            };
            materialize(record, dest, false, &report)
                .map_err(|e| sevenz_rust2::Error::Other(e.to_string().into()))?;
            debug!(entry = %entry.name, "7z entry done");
            Ok(true)
        };

        sevenz_rust2::decompress_with_extract_fn(reader, dest, extract_fn)?;

        let report = report.snapshot();
        info!(
            source = %source.display(),
            files = report.files_extracted,
            "7z extracted"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "7z"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ExtractionError;
    use std::fs;
    use tempfile::TempDir;

    const SEVENZ_MAGIC: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

    #[test]
    fn test_name() {
        assert_eq!(SevenZUnpacker::new().name(), "7z");
    }

    #[test]
    fn test_truncated_archive_fails() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.7z");
        fs::write(&source, SEVENZ_MAGIC).unwrap();

        let result = SevenZUnpacker::new().unpack(&source, &temp.path().join("out"));
        assert!(matches!(result, Err(ExtractionError::Delegate { .. })));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let temp = TempDir::new().unwrap();
        let result = SevenZUnpacker::new().unpack(&temp.path().join("gone.7z"), temp.path());
        assert!(matches!(result, Err(ExtractionError::Io(_))));
    }
}
