//! Filesystem watching.
//!
//! The production watcher is a polling scanner: it fingerprints every
//! file under the project root by modification time and size, and diffs
//! consecutive scans into create/update/delete event batches. Ignored
//! prefixes (the cache dir, dist dirs, VCS metadata) are skipped during
//! the walk, so output written by a build never re-triggers one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, Sender};

use crate::events::{FsEvent, FsEventKind};

/// A source of filesystem event batches.
///
/// `watch` starts observing and delivers batches on the given sender
/// until the returned guard is dropped.
pub trait Watcher: Send + Sync {
    /// Starts watching `root`, skipping paths under any `ignore` prefix.
    fn watch(&self, root: &Path, ignore: &[PathBuf], events: Sender<Vec<FsEvent>>) -> WatchGuard;
}

/// Stops the watching thread when dropped.
pub struct WatchGuard {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WatchGuard {
    /// Wraps a stop flag and the thread it stops.
    pub fn new(stop: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Modification time and size; changes to either count as an update.
type Fingerprint = (SystemTime, u64);

/// A polling filesystem watcher.
pub struct PollingWatcher {
    interval: Duration,
}

impl PollingWatcher {
    /// Creates a watcher scanning at the given interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Watcher for PollingWatcher {
    fn watch(&self, root: &Path, ignore: &[PathBuf], events: Sender<Vec<FsEvent>>) -> WatchGuard {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let root = root.to_path_buf();
        let ignore = ignore.to_vec();
        let interval = self.interval;

        let handle = std::thread::spawn(move || {
            // The first scan is the baseline; only later diffs are events.
            let mut seen = scan(&root, &ignore);
            while !thread_stop.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                let current = scan(&root, &ignore);
                let batch = diff(&seen, &current);
                seen = current;
                if !batch.is_empty() && events.send(batch).is_err() {
                    break;
                }
            }
        });

        WatchGuard::new(stop, handle)
    }
}

/// Fingerprints every file under `root`, skipping ignored prefixes.
fn scan(root: &Path, ignore: &[PathBuf]) -> HashMap<PathBuf, Fingerprint> {
    let mut out = HashMap::new();
    scan_dir(root, ignore, &mut out);
    out
}

fn scan_dir(dir: &Path, ignore: &[PathBuf], out: &mut HashMap<PathBuf, Fingerprint>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if ignore.iter().any(|prefix| path.starts_with(prefix)) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            scan_dir(&path, ignore, out);
        } else if metadata.is_file() {
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.insert(path, (mtime, metadata.len()));
        }
    }
}

/// Diffs two scans into an event batch, sorted by path for determinism.
fn diff(
    before: &HashMap<PathBuf, Fingerprint>,
    after: &HashMap<PathBuf, Fingerprint>,
) -> Vec<FsEvent> {
    let mut batch = Vec::new();
    for (path, fingerprint) in after {
        match before.get(path) {
            None => batch.push(FsEvent::new(path.clone(), FsEventKind::Create)),
            Some(old) if old != fingerprint => {
                batch.push(FsEvent::new(path.clone(), FsEventKind::Update));
            }
            Some(_) => {}
        }
    }
    for path in before.keys() {
        if !after.contains_key(path) {
            batch.push(FsEvent::new(path.clone(), FsEventKind::Delete));
        }
    }
    batch.sort_by(|a, b| a.path.cmp(&b.path));
    batch
}

/// A watcher fed manually through a channel.
///
/// Used by tests and embedders that already know what changed: batches
/// pushed into the handle come out of the watch stream unmodified.
pub struct ChannelWatcher {
    source: Receiver<Vec<FsEvent>>,
}

impl ChannelWatcher {
    /// Creates a watcher and the sender that feeds it.
    pub fn channel() -> (Sender<Vec<FsEvent>>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, Self { source: rx })
    }
}

impl Watcher for ChannelWatcher {
    fn watch(&self, _root: &Path, _ignore: &[PathBuf], events: Sender<Vec<FsEvent>>) -> WatchGuard {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let source = self.source.clone();

        let handle = std::thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                match source.recv_timeout(Duration::from_millis(20)) {
                    Ok(batch) => {
                        if events.send(batch).is_err() {
                            break;
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        WatchGuard::new(stop, handle)
    }
}
