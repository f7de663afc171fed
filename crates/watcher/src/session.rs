//! Watch session: one OS watch over one directory tree
//!
//! A session is either inactive or active. Opening it starts a recursive
//! `notify` watcher whose callback hands raw events to a dedicated
//! classifier thread over a bounded channel. The classifier turns them into
//! change records and pushes them onto the session's queue.
//!
//! Any classification failure is fatal for the activation: it is logged
//! and the session closes itself. Callers poll `is_running()` and reopen.

use crate::classify::{Classifier, RecentCreates};
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::raw::{RawChange, Translator, MOVE_PAIRING_WINDOW};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use dirwatch_core::{ChangeQueue, ChangeRecord};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the classifier wakes up with no events to run housekeeping
const CLASSIFIER_TICK: Duration = Duration::from_millis(100);

/// Lock wait between cancellation checks when the classifier closes itself
const LOCK_POLL: Duration = Duration::from_millis(10);

/// Messages from the notify callback to the classifier thread
enum RawMessage {
    Event(notify::Event),
    Error(notify::Error),
    Fault(String),
}

/// Resources owned by an active session
struct ActiveWatch {
    generation: u64,
    root: PathBuf,
    watcher: RecommendedWatcher,
    worker: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    raw_tx: Sender<RawMessage>,
}

enum WatchState {
    Inactive,
    Active(ActiveWatch),
}

struct Shared {
    config: WatchConfig,
    queue: Arc<ChangeQueue>,
    state: Mutex<WatchState>,
    generation: AtomicU64,
    recent_creates: RecentCreates,
}

/// Watch over one directory tree
pub struct WatchSession {
    shared: Arc<Shared>,
}

impl WatchSession {
    /// Create an inactive session; nothing touches the filesystem until
    /// `open()`
    pub fn new(config: WatchConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                queue: Arc::new(ChangeQueue::new()),
                state: Mutex::new(WatchState::Inactive),
                generation: AtomicU64::new(0),
                recent_creates: RecentCreates::default(),
            }),
        }
    }

    /// Session over `path` with no filter
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self::new(WatchConfig::new(path))
    }

    /// Session over `path` limited to names matching `pattern`
    pub fn with_filter(path: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::new(WatchConfig::new(path).with_filter(pattern))
    }

    /// Start watching
    ///
    /// Creates the root directory (and missing ancestors) if it does not
    /// exist. Calling `open` on a running session does nothing.
    pub fn open(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if matches!(*state, WatchState::Active(_)) {
            debug!("Watch already open: {}", self.shared.config.path.display());
            return Ok(());
        }

        let active = Shared::activate(&self.shared)?;
        info!("Watch opened: {}", active.root.display());
        *state = WatchState::Active(active);
        Ok(())
    }

    /// Stop watching
    ///
    /// Safe to call at any time, including after the session closed itself
    /// on a failure. Joins the classifier thread before returning.
    pub fn close(&self) {
        self.shared.close(None);
    }

    /// Number of times the session has been opened
    pub fn activations(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.shared.state.lock(), WatchState::Active(_))
    }

    /// Pop the oldest pending change record
    pub fn dequeue(&self) -> Option<ChangeRecord> {
        self.shared.queue.pop()
    }

    /// Queue shared with consumers
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.shared.queue
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn config(&self) -> &WatchConfig {
        &self.shared.config
    }

    /// Root as configured
    pub fn path(&self) -> &Path {
        &self.shared.config.path
    }

    /// Canonical root of the active watch
    pub fn root(&self) -> Option<PathBuf> {
        match &*self.shared.state.lock() {
            WatchState::Active(active) => Some(active.root.clone()),
            WatchState::Inactive => None,
        }
    }

    /// Feed a synthetic fault through the classification path
    ///
    /// The session reacts exactly as it would to a real watcher fault: it
    /// logs the error and closes itself. Returns `false` if the session was
    /// not running.
    pub fn inject_fault(&self, reason: impl Into<String>) -> bool {
        match &*self.shared.state.lock() {
            WatchState::Active(active) => active.raw_tx.try_send(RawMessage::Fault(reason.into())).is_ok(),
            WatchState::Inactive => false,
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.shared.close(None);
    }
}

impl Shared {
    /// Build everything an active session owns. Called with the state lock
    /// held; on error nothing is left running.
    fn activate(shared: &Arc<Shared>) -> Result<ActiveWatch> {
        let config = &shared.config;

        std::fs::create_dir_all(&config.path).map_err(|e| WatchError::io(&config.path, e))?;
        let root = std::fs::canonicalize(&config.path).map_err(|e| WatchError::io(&config.path, e))?;

        let classifier = Classifier::from_config(config, Arc::clone(&shared.recent_creates))?;

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));
        let overflowed = Arc::new(AtomicBool::new(false));
        let (raw_tx, raw_rx) = bounded(config.effective_buffer_capacity());

        let worker = {
            let shared = Arc::clone(shared);
            let cancel = Arc::clone(&cancel);
            let overflowed = Arc::clone(&overflowed);
            thread::Builder::new()
                .name(format!("dirwatch-classifier-{}", generation))
                .spawn(move || {
                    run_classifier(shared, generation, classifier, raw_rx, cancel, overflowed)
                })
                .map_err(WatchError::Spawn)?
        };

        let callback_tx = raw_tx.clone();
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| {
                let message = match result {
                    Ok(event) => RawMessage::Event(event),
                    Err(e) => RawMessage::Error(e),
                };
                match callback_tx.try_send(message) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                    Err(TrySendError::Full(_)) => overflowed.store(true, Ordering::Release),
                }
            },
            notify::Config::default(),
        )
        .and_then(|mut watcher| {
            watcher.watch(&root, RecursiveMode::Recursive)?;
            Ok(watcher)
        });

        let watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                cancel.store(true, Ordering::Release);
                drop(raw_tx);
                let _ = worker.join();
                return Err(e.into());
            }
        };

        Ok(ActiveWatch {
            generation,
            root,
            watcher,
            worker,
            cancel,
            raw_tx,
        })
    }

    /// Deactivate the session
    ///
    /// With `Some(generation)` only that activation is closed, so a stale
    /// classifier cannot tear down a newer one.
    fn close(&self, generation: Option<u64>) {
        let active = Self::take_active(&mut self.state.lock(), generation);
        // Tear down outside the lock: the classifier may be waiting on it
        if let Some(active) = active {
            teardown(active);
        }
    }

    /// Close from the classifier thread after a failure
    ///
    /// Never blocks on the state lock: whoever holds it may be joining this
    /// very thread, in which case `cancel` is already set.
    fn close_after_failure(&self, generation: u64, cancel: &AtomicBool) {
        loop {
            if cancel.load(Ordering::Acquire) {
                return;
            }
            if let Some(mut state) = self.state.try_lock_for(LOCK_POLL) {
                let active = Self::take_active(&mut state, Some(generation));
                drop(state);
                if let Some(active) = active {
                    teardown(active);
                }
                return;
            }
        }
    }

    fn take_active(state: &mut WatchState, generation: Option<u64>) -> Option<ActiveWatch> {
        match state {
            WatchState::Active(active) if generation.map_or(true, |g| g == active.generation) => {}
            _ => return None,
        }
        match std::mem::replace(state, WatchState::Inactive) {
            WatchState::Active(active) => Some(active),
            WatchState::Inactive => None,
        }
    }
}

/// Stop the watcher and wait for the classifier to finish
fn teardown(active: ActiveWatch) {
    let ActiveWatch {
        root,
        mut watcher,
        worker,
        cancel,
        raw_tx,
        ..
    } = active;

    cancel.store(true, Ordering::Release);
    if let Err(e) = watcher.unwatch(&root) {
        debug!("Unwatch of {} failed: {}", root.display(), e);
    }
    drop(watcher);
    drop(raw_tx);

    // The classifier closing itself cannot join its own thread
    if worker.thread().id() != thread::current().id() && worker.join().is_err() {
        warn!("Classifier thread for {} panicked", root.display());
    }

    info!("Watch closed: {}", root.display());
}

/// Classifier thread body
fn run_classifier(
    shared: Arc<Shared>,
    generation: u64,
    classifier: Classifier,
    raw_rx: Receiver<RawMessage>,
    cancel: Arc<AtomicBool>,
    overflowed: Arc<AtomicBool>,
) {
    let mut translator = Translator::new();

    while !cancel.load(Ordering::Acquire) {
        let outcome = match raw_rx.recv_timeout(CLASSIFIER_TICK) {
            Ok(message) => handle_message(&shared, &classifier, &mut translator, message, &cancel),
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let outcome = outcome.and_then(|()| {
            if overflowed.load(Ordering::Acquire) {
                return Err(WatchError::Overflow);
            }
            for change in translator.flush_expired(MOVE_PAIRING_WINDOW) {
                enqueue(&shared, &classifier, change, &cancel)?;
            }
            classifier.prune();
            Ok(())
        });

        if let Err(e) = outcome {
            if cancel.load(Ordering::Acquire) {
                debug!("Ignoring error during shutdown: {}", e);
                break;
            }
            error!("Watch failed on {}: {}", shared.config.path.display(), e);
            shared.close_after_failure(generation, &cancel);
            break;
        }
    }
}

fn handle_message(
    shared: &Shared,
    classifier: &Classifier,
    translator: &mut Translator,
    message: RawMessage,
    cancel: &AtomicBool,
) -> Result<()> {
    match message {
        RawMessage::Event(event) => {
            for change in translator.translate(event)? {
                enqueue(shared, classifier, change, cancel)?;
            }
            Ok(())
        }
        RawMessage::Error(e) => Err(e.into()),
        RawMessage::Fault(reason) => Err(WatchError::Injected(reason)),
    }
}

/// Classify one change and push the result; renames skip the dedup check
fn enqueue(shared: &Shared, classifier: &Classifier, change: RawChange, cancel: &AtomicBool) -> Result<()> {
    let Some(record) = classifier.classify(change, cancel)? else {
        return Ok(());
    };

    if record.is_rename() {
        shared.queue.push(record);
    } else if !shared.queue.push_unique(record) {
        debug!("Dropped duplicate pending change");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        condition()
    }

    #[test]
    fn test_open_creates_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("a/b/c");

        let session = WatchSession::with_path(&root);
        assert!(!root.exists());
        assert!(!session.is_running());

        session.open().unwrap();
        assert!(root.is_dir());
        assert!(session.is_running());
        assert_eq!(session.root(), Some(std::fs::canonicalize(&root).unwrap()));

        session.close();
        assert!(!session.is_running());
        assert!(session.root().is_none());
    }

    #[test]
    fn test_open_twice_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let session = WatchSession::with_path(temp_dir.path());

        session.open().unwrap();
        session.open().unwrap();

        assert_eq!(session.activations(), 1);
        session.close();
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let session = WatchSession::with_path(temp_dir.path());

        session.close();
        session.open().unwrap();
        session.close();
        session.close();
        assert!(!session.is_running());
    }

    #[test]
    fn test_invalid_filter_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let session = WatchSession::with_filter(temp_dir.path(), "[broken");

        assert!(matches!(session.open(), Err(WatchError::Filter { .. })));
        assert!(!session.is_running());
    }

    #[test]
    fn test_fault_closes_session() {
        let temp_dir = TempDir::new().unwrap();
        let session = WatchSession::with_path(temp_dir.path());

        assert!(!session.inject_fault("not running"));

        session.open().unwrap();
        assert!(session.inject_fault("boom"));
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));

        // Reopen starts a fresh activation
        session.open().unwrap();
        assert!(session.is_running());
        assert_eq!(session.activations(), 2);
    }

    #[test]
    fn test_stale_generation_cannot_close_newer_watch() {
        let temp_dir = TempDir::new().unwrap();
        let session = WatchSession::with_path(temp_dir.path());

        session.open().unwrap();
        session.close();
        session.open().unwrap();

        session.shared.close(Some(1));
        assert!(session.is_running());

        session.shared.close(Some(2));
        assert!(!session.is_running());
    }
}
