//! Unit of tar extraction work.

use std::path::Path;
use std::path::PathBuf;

/// One container to unpack: where it is, where it goes, and how many more
/// levels of nested containers may be unpacked beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTask {
    /// Container file.
    pub source: PathBuf,
    /// Destination directory.
    pub dest: PathBuf,
    /// Remaining nesting depth. Nested containers are unpacked only while
    /// this is positive.
    pub depth_budget: usize,
}

impl ExtractionTask {
    /// Creates a task.
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>, depth_budget: usize) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            depth_budget,
        }
    }

    /// Returns `true` if nested containers found by this task may be
    /// unpacked.
    #[must_use]
    pub const fn allows_recursion(&self) -> bool {
        self.depth_budget > 0
    }

    /// Derives the task for a nested container, one level deeper.
    ///
    /// Returns `None` when this task does not allow recursion.
    #[must_use]
    pub fn child(&self, source: &Path, dest: PathBuf) -> Option<Self> {
        let depth_budget = self.depth_budget.checked_sub(1)?;
        Some(Self {
            source: source.to_path_buf(),
            dest,
            depth_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_decrements() {
        let top = ExtractionTask::new("a.tar", "out", 1);
        assert!(top.allows_recursion());

        let child = top.child(Path::new("out/b.tar"), PathBuf::from("out/b")).unwrap();
        assert_eq!(child.depth_budget, 0);
        assert!(!child.allows_recursion());
        assert!(child.child(Path::new("x.tar"), PathBuf::from("x")).is_none());
    }
}
