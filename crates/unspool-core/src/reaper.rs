//! Background removal of empty directories under the watched root.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;
use tracing::trace;
use tracing::warn;
use walkdir::WalkDir;

use crate::UnpackConfig;
use crate::error::is_benign_io;

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Directories removed.
    pub removed: usize,
    /// Directories that vanished or gained entries before removal.
    pub raced: usize,
    /// Paths that could not be inspected or removed.
    pub errors: usize,
}

/// Removes every empty directory below `root`, never `root` itself.
///
/// The walk is children-first, so a chain of nested empty directories
/// disappears in a single sweep.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use unspool_core::Reaper;
///
/// let root = tempfile::tempdir().unwrap();
/// std::fs::create_dir_all(root.path().join("a/b/c")).unwrap();
///
/// let stats = Reaper::new(root.path(), Duration::from_secs(1)).sweep();
/// assert_eq!(stats.removed, 3);
/// assert!(root.path().exists());
/// ```
#[derive(Debug, Clone)]
pub struct Reaper {
    root: PathBuf,
    interval: Duration,
}

impl Reaper {
    /// Creates a reaper for `root` sweeping every `interval`.
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
        }
    }

    /// Creates a reaper using the interval from `config`.
    pub fn from_config(root: impl Into<PathBuf>, config: &UnpackConfig) -> Self {
        Self::new(root, config.reap_interval)
    }

    /// Returns the watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs one sweep.
    pub fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.io_error().is_some_and(|e| e.kind() == io::ErrorKind::NotFound) {
                        stats.raced += 1;
                    } else {
                        warn!(error = %err, "cannot inspect path during sweep");
                        stats.errors += 1;
                    }
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            match remove_if_empty(entry.path()) {
                Ok(true) => {
                    debug!(path = %entry.path().display(), "removed empty directory");
                    stats.removed += 1;
                }
                Ok(false) => {}
                Err(err) if is_benign_io(&err) => {
                    trace!(path = %entry.path().display(), error = %err, "directory changed under sweep");
                    stats.raced += 1;
                }
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "cannot remove directory");
                    stats.errors += 1;
                }
            }
        }

        stats
    }

    /// Starts sweeping on a background thread. The loop ends when the
    /// returned handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self) -> io::Result<ReaperHandle> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("reaper".into())
            .spawn(move || {
                debug!(root = %self.root.display(), interval_ms = self.interval.as_millis(), "reaper started");
                loop {
                    match stopped.recv_timeout(self.interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.sweep();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(root = %self.root.display(), "reaper stopped");
            })?;

        Ok(ReaperHandle {
            stop: Some(stop),
            thread: Some(thread),
        })
    }
}

fn remove_if_empty(path: &Path) -> io::Result<bool> {
    if fs::read_dir(path)?.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(path)?;
    Ok(true)
}

/// Handle to a running reaper loop.
#[derive(Debug)]
pub struct ReaperHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Stops the loop and waits for the current sweep to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("reaper thread panicked");
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
