//! Watch command: initial scan, empty-directory reaper and the inbox event
//! loop.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use notify::Event;
use notify::EventKind;
use notify::RecursiveMode;
use notify::Watcher;
use notify::event::ModifyKind;
use notify::event::RenameMode;
use tracing::debug;
use tracing::info;
use tracing::warn;
use unspool_core::DispatchResult;
use unspool_core::Dispatcher;
use unspool_core::Reaper;
use walkdir::WalkDir;

use crate::cli::UnpackArgs;
use crate::cli::WatchArgs;
use crate::output::OutputFormatter;

/// Upper bound on how long a due arrival waits for the loop to notice it.
const TICK: Duration = Duration::from_millis(50);

enum Message {
    Fs(notify::Result<Event>),
    Done(DispatchResult),
}

pub fn execute(
    args: &WatchArgs,
    unpack: &UnpackArgs,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    fs::create_dir_all(&args.inbox)
        .with_context(|| format!("failed to create inbox {}", args.inbox.display()))?;
    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create output {}", args.output.display()))?;
    ensure_outside_inbox(&args.inbox, &args.output, "output")?;
    if let Some(quarantine) = &unpack.quarantine {
        fs::create_dir_all(quarantine).with_context(|| {
            format!("failed to create quarantine {}", quarantine.display())
        })?;
        ensure_outside_inbox(&args.inbox, quarantine, "quarantine")?;
    }

    let config = unpack.to_config().with_reap_interval(args.reap_interval());
    let dispatcher = Dispatcher::new(config);

    let (tx, rx) = mpsc::channel();
    let events = tx.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = events.send(Message::Fs(res));
    })
    .context("failed to create filesystem watcher")?;
    // Registered before the scan so nothing dropped in between is missed.
    watcher
        .watch(&args.inbox, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", args.inbox.display()))?;

    let mut queue = ArrivalQueue::new(args.settle());
    let now = Instant::now();
    for path in scan(&args.inbox) {
        queue.push_due(path, now);
    }
    info!(inbox = %args.inbox.display(), queued = queue.len(), "initial scan complete");

    let _reaper = Reaper::from_config(&args.inbox, dispatcher.config())
        .spawn()
        .context("failed to start reaper thread")?;
    formatter.format_watching(&args.inbox, &args.output);

    let mut running: HashSet<PathBuf> = HashSet::new();
    loop {
        match rx.recv_timeout(TICK) {
            Ok(Message::Fs(Ok(event))) => {
                let now = Instant::now();
                for path in arrivals(&event) {
                    if path.is_dir() {
                        // Files created before the new directory was watched.
                        for file in scan(&path) {
                            queue.touch(file, now);
                        }
                    } else {
                        // A path still being dispatched is deferred, not dropped.
                        queue.touch(path, now);
                    }
                }
            }
            Ok(Message::Fs(Err(err))) => {
                warn!(error = %err, "filesystem watcher error");
                formatter.format_warning(&format!("watcher error: {err}"));
            }
            Ok(Message::Done(result)) => {
                running.remove(&result.source);
                if let Err(err) = formatter.format_dispatch_result(&result) {
                    warn!(error = %err, "failed to print result");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for path in queue.take_ready(Instant::now(), &running) {
            if !is_regular_file(&path) {
                debug!(path = %path.display(), "arrival is gone or not a regular file");
                continue;
            }
            running.insert(path.clone());
            formatter.format_processing(&path);

            let dispatcher = dispatcher.clone();
            let output = args.output.clone();
            let done = tx.clone();
            thread::Builder::new()
                .name("dispatch".into())
                .spawn(move || {
                    let result = dispatcher.dispatch(&path, &output);
                    let _ = done.send(Message::Done(result));
                })
                .context("failed to spawn dispatch thread")?;
        }
    }

    Ok(())
}

/// Fails if `dir` is the inbox or lies under it; its files would come
/// back as new arrivals. Both directories must exist.
fn ensure_outside_inbox(inbox: &Path, dir: &Path, role: &str) -> Result<()> {
    let inbox = fs::canonicalize(inbox)
        .with_context(|| format!("failed to resolve inbox {}", inbox.display()))?;
    let resolved = fs::canonicalize(dir)
        .with_context(|| format!("failed to resolve {role} {}", dir.display()))?;
    if resolved.starts_with(&inbox) {
        bail!(
            "{role} directory {} is inside the inbox {}\n\
             HINT: Choose a {role} directory outside the watched tree.",
            dir.display(),
            inbox.display()
        );
    }
    Ok(())
}

/// Regular files under `root`, root itself excluded.
fn scan(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "skipping unreadable inbox entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Paths an event reports as newly present or still being written.
fn arrivals(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(
            ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Name(RenameMode::To),
        ) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file())
}

/// Paths waiting out the settle delay. Every new event for a path pushes
/// its deadline back.
#[derive(Debug)]
struct ArrivalQueue {
    settle: Duration,
    deadlines: HashMap<PathBuf, Instant>,
}

impl ArrivalQueue {
    fn new(settle: Duration) -> Self {
        Self {
            settle,
            deadlines: HashMap::new(),
        }
    }

    fn touch(&mut self, path: PathBuf, now: Instant) {
        self.deadlines.insert(path, now + self.settle);
    }

    fn push_due(&mut self, path: PathBuf, now: Instant) {
        self.deadlines.insert(path, now);
    }

    fn len(&self) -> usize {
        self.deadlines.len()
    }

    fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let due: Vec<PathBuf> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            self.deadlines.remove(path);
        }
        due
    }

    /// Like [`ArrivalQueue::take_due`], but a due path whose previous
    /// dispatch has not reported back yet waits another settle delay.
    fn take_ready(&mut self, now: Instant, running: &HashSet<PathBuf>) -> Vec<PathBuf> {
        let (busy, ready): (Vec<PathBuf>, Vec<PathBuf>) = self
            .take_due(now)
            .into_iter()
            .partition(|path| running.contains(path));
        for path in busy {
            self.touch(path, now);
        }
        ready
    }
}
