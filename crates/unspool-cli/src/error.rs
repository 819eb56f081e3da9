//! Error conversion utilities for CLI.
//!
//! Converts unspool-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use std::path::Path;

use anyhow::anyhow;
use unspool_core::ExtractionError;

/// Converts `ExtractionError` to user-friendly anyhow error with context
pub fn convert_extraction_error(err: ExtractionError, input: &Path) -> anyhow::Error {
    match err {
        ExtractionError::UnsafePath { path } => {
            anyhow!(
                "Unsafe entry in '{}': '{}' would land outside the output directory\n\
                 HINT: The entry was skipped. Inspect the archive before trusting it.",
                input.display(),
                path.display()
            )
        }
        ExtractionError::Io(io_err) => {
            anyhow!("I/O error while processing '{}': {}", input.display(), io_err)
        }
        ExtractionError::UnsupportedFormat { .. } => {
            anyhow!(
                "Format not supported: {}\n\
                 HINT: Supported inputs: zip, rar, 7z, tar, tar.gz and plain text",
                input.display()
            )
        }
        ExtractionError::InvalidArchive(reason) => {
            anyhow!(
                "Invalid archive '{}': {}\n\
                 HINT: The archive may be corrupted or truncated.",
                input.display(),
                reason
            )
        }
        ExtractionError::Delegate { tool, reason } if reason.starts_with("cannot start") => {
            anyhow!(
                "Could not unpack '{}': {} {}\n\
                 HINT: Install the `unrar` command and make sure it is on PATH.",
                input.display(),
                tool,
                reason
            )
        }
        ExtractionError::Delegate { tool, reason } => {
            anyhow!("Could not unpack '{}': {} failed: {}", input.display(), tool, reason)
        }
    }
}

/// Adds context to a generic error about dispatch operations
pub fn add_input_context<T>(
    result: Result<T, ExtractionError>,
    input: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_extraction_error(e, input))
}
