//! Debounced filesystem watching for the dev loop.
//!
//! [`watch_dir`] watches a project recursively and calls a rebuild callback
//! once per burst of changes: the first relevant event opens a window of
//! `delay`, and when it closes the callback runs to completion before the
//! next window can open. Events that arrive while the callback runs are
//! queued and open the next window.
//!
//! Changes under the output directory never trigger a rebuild, nor do
//! access-only or metadata-only (chmod) events.
//!
//! The loop itself is [`debounce`], which reads events from a channel so it
//! can run without a real watcher.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

/// Whether an event should trigger a rebuild.
pub fn is_relevant(event: &Event, ignore_dir: &Path) -> bool {
    if matches!(
        event.kind,
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_))
    ) {
        return false;
    }
    event.paths.is_empty() || event.paths.iter().any(|p| !p.starts_with(ignore_dir))
}

/// Watch `dir` and call `rebuild` after each debounced burst of changes.
///
/// `ignore` names a subdirectory of `dir` whose changes are ignored. Blocks
/// until the watcher fails.
pub fn watch_dir<F: FnMut()>(
    dir: &Path,
    delay: Duration,
    ignore: &str,
    rebuild: F,
) -> Result<(), WatchError> {
    let dir = dir.canonicalize()?;
    let ignore_dir = dir.join(ignore);

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())?;
    watcher.watch(&dir, RecursiveMode::Recursive)?;
    debug!(dir = %dir.display(), ?delay, "watching for changes");

    debounce(rx, delay, &ignore_dir, rebuild)
}

/// Call `rebuild` once per burst of relevant events received on `rx`.
///
/// A window opens at the first relevant event and closes `delay` later.
/// Returns when every sender is gone, after running a rebuild still owed to
/// an open window, or with the first error the watcher reports.
pub fn debounce<F: FnMut()>(
    rx: Receiver<notify::Result<Event>>,
    delay: Duration,
    ignore_dir: &Path,
    mut rebuild: F,
) -> Result<(), WatchError> {
    let mut deadline: Option<Instant> = None;
    loop {
        let received = match deadline {
            Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(event) => {
                let event = event?;
                trace!(?event, "filesystem event");
                if deadline.is_none() && is_relevant(&event, ignore_dir) {
                    deadline = Some(Instant::now() + delay);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                rebuild();
            }
            Err(RecvTimeoutError::Disconnected) => {
                if deadline.is_some() {
                    rebuild();
                }
                return Ok(());
            }
        }
    }
}
