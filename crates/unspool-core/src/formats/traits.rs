//! Seam for unpackers the dispatcher hands whole containers to.

use std::path::Path;

use crate::Result;

/// An unpack routine that takes a container path and a destination and
/// extracts everything, reporting only success or failure.
///
/// Rar and 7z containers go through this trait so the routine can be an
/// in-process library or an external program.
pub trait DelegatedUnpacker: Send + Sync {
    /// Extracts `source` into `dest`, creating `dest` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be unpacked.
    fn unpack(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Returns a short name used in logs and errors.
    fn name(&self) -> &str;
}
