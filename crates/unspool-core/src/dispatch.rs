//! Routing of one input file to the unpacker its content calls for.
//!
//! Every call ends with the input disposed of according to the configured
//! [`SourcePolicy`]. Nothing here returns an error to the caller: failures
//! are logged and come back as a [`DispatchOutcome`].

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::ExtractionError;
use crate::ExtractionReport;
use crate::Result;
use crate::SourcePolicy;
use crate::UnpackConfig;
use crate::formats::CommandUnpacker;
use crate::formats::DelegatedUnpacker;
use crate::formats::FormatTag;
use crate::formats::SevenZUnpacker;
use crate::formats::TarUnpacker;
use crate::formats::ZipUnpacker;
use crate::formats::common::ensure_dir;
use crate::formats::detect_path;
use crate::limiter::Limiter;
use crate::report::SharedReport;
use crate::types::ExtractionTask;

/// What dispatch did with the content of an input.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The container was unpacked. Per-entry failures are in the report.
    Extracted(ExtractionReport),
    /// A plain-text input was moved to the given path.
    Moved(PathBuf),
    /// The content matched no supported format.
    Rejected,
    /// The container could not be unpacked.
    Failed(ExtractionError),
}

impl DispatchOutcome {
    /// Returns `true` for [`DispatchOutcome::Extracted`] and
    /// [`DispatchOutcome::Moved`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Extracted(_) | Self::Moved(_))
    }
}

/// What happened to the input path after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposal {
    /// The input was deleted.
    Removed,
    /// The input was moved into the quarantine directory.
    Quarantined(PathBuf),
    /// The input was moved as the outcome itself.
    Consumed,
    /// The input no longer existed.
    Vanished,
    /// The input could not be disposed of and is still in place.
    Kept(String),
}

/// Full record of one dispatch.
#[derive(Debug)]
pub struct DispatchResult {
    /// Input path.
    pub source: PathBuf,
    /// Detected format.
    pub format: FormatTag,
    /// Outcome of routing.
    pub outcome: DispatchOutcome,
    /// Fate of the input path.
    pub disposal: Disposal,
}

/// Detects, routes and disposes of input files.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use unspool_core::Dispatcher;
/// use unspool_core::UnpackConfig;
///
/// let dispatcher = Dispatcher::new(UnpackConfig::default());
/// let result = dispatcher.dispatch(Path::new("inbox/drop.zip"), Path::new("out"));
/// println!("{:?} -> {:?}", result.format, result.disposal);
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    config: UnpackConfig,
    rar: Arc<dyn DelegatedUnpacker>,
    sevenz: Arc<dyn DelegatedUnpacker>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("rar", &self.rar.name())
            .field("sevenz", &self.sevenz.name())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher using `unrar` for rar and the built-in 7z
    /// unpacker.
    #[must_use]
    pub fn new(config: UnpackConfig) -> Self {
        Self {
            config,
            rar: Arc::new(CommandUnpacker::unrar()),
            sevenz: Arc::new(SevenZUnpacker::new()),
        }
    }

    /// Replaces the rar delegate.
    #[must_use]
    pub fn with_rar_delegate(mut self, delegate: Arc<dyn DelegatedUnpacker>) -> Self {
        self.rar = delegate;
        self
    }

    /// Replaces the 7z delegate.
    #[must_use]
    pub fn with_sevenz_delegate(mut self, delegate: Arc<dyn DelegatedUnpacker>) -> Self {
        self.sevenz = delegate;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UnpackConfig {
        &self.config
    }

    /// Detects the format of `source`, routes it, then disposes of it.
    ///
    /// Containers unpack into `dest_root`; plain-text files move into it
    /// under their base name. Unpacking of tar containers includes every
    /// nested task before this returns.
    pub fn dispatch(&self, source: &Path, dest_root: &Path) -> DispatchResult {
        let format = detect_path(source);
        if let Some(advisory) = FormatTag::advisory_from_path(source)
            && advisory != format
        {
            warn!(
                path = %source.display(),
                extension = %advisory,
                content = %format,
                "file extension does not match content"
            );
        }
        info!(path = %source.display(), %format, "processing");

        let outcome = match format {
            FormatTag::Zip => Self::finish(ZipUnpacker::new(&self.config).unpack(source, dest_root)),
            FormatTag::Tar | FormatTag::TarGz => Self::finish(self.unpack_tar(source, dest_root)),
            FormatTag::Rar => Self::finish(Self::delegate(&*self.rar, source, dest_root)),
            FormatTag::SevenZ => Self::finish(Self::delegate(&*self.sevenz, source, dest_root)),
            FormatTag::PlainText => match move_into(source, dest_root) {
                Ok(to) => DispatchOutcome::Moved(to),
                Err(err) => DispatchOutcome::Failed(err.into()),
            },
            FormatTag::Unknown => DispatchOutcome::Rejected,
        };

        match &outcome {
            DispatchOutcome::Extracted(report) => info!(
                path = %source.display(),
                files = report.files_extracted,
                failures = report.failures.len(),
                duration_ms = report.duration.as_millis(),
                "extracted"
            ),
            DispatchOutcome::Moved(to) => {
                info!(path = %source.display(), to = %to.display(), "moved");
            }
            DispatchOutcome::Rejected => warn!(path = %source.display(), "unsupported format"),
            DispatchOutcome::Failed(err) => {
                error!(path = %source.display(), %format, error = %err, "dispatch failed");
            }
        }

        let disposal = self.dispose(source, &outcome);
        DispatchResult {
            source: source.to_path_buf(),
            format,
            outcome,
            disposal,
        }
    }

    fn finish(result: Result<ExtractionReport>) -> DispatchOutcome {
        match result {
            Ok(report) => DispatchOutcome::Extracted(report),
            Err(err) => DispatchOutcome::Failed(err),
        }
    }

    fn unpack_tar(&self, source: &Path, dest_root: &Path) -> Result<ExtractionReport> {
        let started = Instant::now();
        let limiter = Arc::new(Limiter::new(self.config.concurrency));
        let report = SharedReport::new();
        let unpacker = TarUnpacker::new(&self.config, Arc::clone(&limiter), report.clone());

        let task = ExtractionTask::new(source, dest_root, self.config.max_nesting_depth);
        let result = unpacker.unpack_file(&task);
        // Nested tasks may have been scheduled before a failure.
        limiter.wait();
        result?;

        let mut report = report.snapshot();
        report.duration = started.elapsed();
        Ok(report)
    }

    fn delegate(
        delegate: &dyn DelegatedUnpacker,
        source: &Path,
        dest_root: &Path,
    ) -> Result<ExtractionReport> {
        let started = Instant::now();
        delegate.unpack(source, dest_root)?;
        let mut report = ExtractionReport::new();
        report.duration = started.elapsed();
        Ok(report)
    }

    fn dispose(&self, source: &Path, outcome: &DispatchOutcome) -> Disposal {
        let disposal = match (outcome, &self.config.source_policy) {
            (DispatchOutcome::Moved(_), _) => return Disposal::Consumed,
            (_, SourcePolicy::Remove) => remove_source(source),
            // Partial extractions count as failures for quarantine.
            (DispatchOutcome::Extracted(report), SourcePolicy::Quarantine(_))
                if !report.has_failures() =>
            {
                remove_source(source)
            }
            (_, SourcePolicy::Quarantine(dir)) => quarantine(source, dir),
        };
        if let Disposal::Kept(reason) = &disposal {
            warn!(path = %source.display(), %reason, "input left in place");
        }
        disposal
    }
}

fn remove_source(source: &Path) -> Disposal {
    match fs::remove_file(source) {
        Ok(()) => Disposal::Removed,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Disposal::Vanished,
        Err(err) => Disposal::Kept(err.to_string()),
    }
}

fn quarantine(source: &Path, dir: &Path) -> Disposal {
    if !source.exists() {
        return Disposal::Vanished;
    }
    match move_into(source, dir) {
        Ok(to) => {
            info!(path = %source.display(), to = %to.display(), "quarantined");
            Disposal::Quarantined(to)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Disposal::Vanished,
        Err(err) => Disposal::Kept(err.to_string()),
    }
}

/// Moves `source` into `dir` under its base name, creating `dir` if needed.
/// Falls back to copy and remove when `dir` is on another filesystem.
fn move_into(source: &Path, dir: &Path) -> io::Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "input path has no file name")
    })?;
    ensure_dir(dir)?;
    let target = dir.join(name);

    match fs::rename(source, &target) {
        Ok(()) => Ok(target),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(source, &target)?;
            fs::remove_file(source)?;
            Ok(target)
        }
        Err(err) => Err(err),
    }
}
