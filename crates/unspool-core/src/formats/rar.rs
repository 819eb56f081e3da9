//! Rar delegate that runs an external extraction program.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use tracing::debug;
use tracing::info;

use crate::ExtractionError;
use crate::Result;

use super::common::ensure_dir;
use super::traits::DelegatedUnpacker;

/// Runs `<program> <args...> <source> <dest>/` and treats a zero exit
/// status as success.
///
/// # Examples
///
/// ```no_run
/// use unspool_core::formats::CommandUnpacker;
/// use unspool_core::formats::DelegatedUnpacker;
///
/// let unrar = CommandUnpacker::unrar();
/// unrar.unpack("inbox/set.rar".as_ref(), "out".as_ref())?;
/// # Ok::<(), unspool_core::ExtractionError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandUnpacker {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandUnpacker {
    /// Creates a delegate for an arbitrary program.
    pub fn new(program: impl Into<OsString>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `unrar x -o+ -idq`: extract with full paths, overwrite existing
    /// files, print errors only.
    #[must_use]
    pub fn unrar() -> Self {
        Self::new("unrar", ["x", "-o+", "-idq"])
    }

    fn tool(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl DelegatedUnpacker for CommandUnpacker {
    fn unpack(&self, source: &Path, dest: &Path) -> Result<()> {
        ensure_dir(dest)?;

        // unrar treats the destination as a directory only with a trailing separator.
        let mut dest_arg = dest.as_os_str().to_os_string();
        dest_arg.push(std::path::MAIN_SEPARATOR_STR);

        debug!(program = %self.tool(), source = %source.display(), "running delegate");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .arg(&dest_arg)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ExtractionError::Delegate {
                tool: self.tool(),
                reason: format!("cannot start: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Delegate {
                tool: self.tool(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        info!(program = %self.tool(), source = %source.display(), "delegate finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "rar"
    }
}
