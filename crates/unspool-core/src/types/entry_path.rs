//! Validated relative entry path.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::ExtractionError;
use crate::Result;

/// A container entry path that stays inside the destination it is joined to.
///
/// Construction rejects absolute paths, drive prefixes and `..` components,
/// and drops `.` components. The empty path (for example a tar entry named
/// `./`) is allowed and denotes the destination itself.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use unspool_core::types::EntryPath;
///
/// let path = EntryPath::parse(Path::new("./docs/readme.txt")).unwrap();
/// assert_eq!(path.as_path(), Path::new("docs/readme.txt"));
///
/// assert!(EntryPath::parse(Path::new("../etc/passwd")).is_err());
/// assert!(EntryPath::parse(Path::new("/etc/passwd")).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath(PathBuf);

impl EntryPath {
    /// Validates a raw entry path.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::UnsafePath` if the path is absolute, carries
    /// a prefix, contains `..`, or contains a NUL byte.
    pub fn parse(raw: &Path) -> Result<Self> {
        let unsafe_path = || ExtractionError::UnsafePath {
            path: raw.to_path_buf(),
        };

        if raw.as_os_str().as_encoded_bytes().contains(&0) {
            return Err(unsafe_path());
        }

        let mut normalized = PathBuf::new();
        for component in raw.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(unsafe_path());
                }
            }
        }
        Ok(Self(normalized))
    }

    /// Returns the normalized relative path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns `true` if the path denotes the destination itself.
    pub fn is_root(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// Resolves the path against a destination directory.
    pub fn resolve(&self, dest: &Path) -> PathBuf {
        dest.join(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let path = EntryPath::parse(Path::new("a/b/c.txt")).unwrap();
        assert_eq!(path.as_path(), Path::new("a/b/c.txt"));
        assert!(!path.is_root());
    }

    #[test]
    fn test_parse_current_dir_only() {
        let path = EntryPath::parse(Path::new("./")).unwrap();
        assert!(path.is_root());
        assert_eq!(path.resolve(Path::new("/out")), PathBuf::from("/out"));
    }

    #[test]
    fn test_parse_rejects_traversal() {
        for raw in ["../x", "a/../../x", "a/b/../../../x", "/abs/x"] {
            assert!(
                matches!(
                    EntryPath::parse(Path::new(raw)),
                    Err(ExtractionError::UnsafePath { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_stays_inside() {
        let dest = Path::new("/srv/out");
        let path = EntryPath::parse(Path::new("./x/./y.bin")).unwrap();
        let resolved = path.resolve(dest);
        assert!(resolved.starts_with(dest));
        assert!(resolved.ends_with("x/y.bin"));
    }
}
