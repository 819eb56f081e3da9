//! Archive entry kind.

/// Kind of an entry inside a container.
///
/// Only regular files and directories are materialized. Everything else
/// (symlinks, hardlinks, devices, fifos) is reported and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file entry.
    File,

    /// Directory entry.
    Directory,

    /// Any other entry type, with a short description for reporting.
    Other(&'static str),
}

impl EntryKind {
    /// Returns `true` if this is a regular file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` if this is a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Maps a tar header entry type onto an `EntryKind`.
    pub(crate) fn from_tar(entry_type: tar::EntryType) -> Self {
        match entry_type {
            tar::EntryType::Regular | tar::EntryType::Continuous => Self::File,
            tar::EntryType::Directory => Self::Directory,
            tar::EntryType::Symlink => Self::Other("symlink"),
            tar::EntryType::Link => Self::Other("hardlink"),
            tar::EntryType::Char | tar::EntryType::Block => Self::Other("device"),
            tar::EntryType::Fifo => Self::Other("fifo"),
            _ => Self::Other("special"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_predicates() {
        assert!(EntryKind::File.is_file());
        assert!(!EntryKind::File.is_directory());
        assert!(EntryKind::Directory.is_directory());
        assert!(!EntryKind::Other("symlink").is_file());
    }

    #[test]
    fn test_from_tar() {
        assert_eq!(EntryKind::from_tar(tar::EntryType::Regular), EntryKind::File);
        assert_eq!(
            EntryKind::from_tar(tar::EntryType::Directory),
            EntryKind::Directory
        );
        assert_eq!(
            EntryKind::from_tar(tar::EntryType::Symlink),
            EntryKind::Other("symlink")
        );
        assert_eq!(
            EntryKind::from_tar(tar::EntryType::Link),
            EntryKind::Other("hardlink")
        );
    }
}
