//! Self-healing consumer loop
//!
//! Polls a watch session: reopens it whenever it is not running, sleeps for
//! one poll interval when the queue is empty, and otherwise hands records
//! to the caller back to back. The poll interval bounds the latency between
//! an event being queued and being processed.
//!
//! Opening registers a recursive OS watch and closing joins the classifier
//! thread, so both run on tokio's blocking pool.

use crate::error::Result;
use crate::session::WatchSession;
use dirwatch_core::ChangeRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counters reported when a drain loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Records handed to the handler
    pub processed: u64,
    /// Successful reopens after the session stopped
    pub reopened: u64,
}

/// Drain `session` until `shutdown` turns true
///
/// The session is opened on the first iteration if needed and closed when
/// the loop exits.
pub async fn drain<F>(
    session: Arc<WatchSession>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut handler: F,
) -> DrainStats
where
    F: FnMut(ChangeRecord),
{
    let mut stats = DrainStats::default();
    let mut opened_once = session.activations() > 0;

    info!(
        "Starting consumer for {} (poll interval: {:?})",
        session.path().display(),
        poll_interval
    );

    while !*shutdown.borrow() {
        if !session.is_running() {
            match open_blocking(&session).await {
                Ok(()) if opened_once => {
                    stats.reopened += 1;
                    info!("Watch on {} recovered", session.path().display());
                }
                Ok(()) => opened_once = true,
                Err(e) => warn!("Failed to open watch on {}: {}", session.path().display(), e),
            }
            pause(poll_interval, &mut shutdown).await;
            continue;
        }

        match session.dequeue() {
            Some(record) => {
                stats.processed += 1;
                handler(record);
                // Let other tasks run between back-to-back records
                tokio::task::yield_now().await;
            }
            None => pause(poll_interval, &mut shutdown).await,
        }
    }

    close_blocking(&session).await;
    info!(
        "Consumer for {} stopped ({} processed, {} reopens)",
        session.path().display(),
        stats.processed,
        stats.reopened
    );
    stats
}

async fn open_blocking(session: &Arc<WatchSession>) -> Result<()> {
    let session = Arc::clone(session);
    tokio::task::spawn_blocking(move || session.open()).await?
}

async fn close_blocking(session: &Arc<WatchSession>) {
    let closer = Arc::clone(session);
    if let Err(e) = tokio::task::spawn_blocking(move || closer.close()).await {
        warn!("Close task for {} failed: {}", session.path().display(), e);
    }
}

/// Sleep for `interval`, waking early on shutdown
async fn pause(interval: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = shutdown.changed() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirwatch_core::{ChangeRecord, ChangeType};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_drain_opens_and_hands_out_records() {
        let temp_dir = TempDir::new().unwrap();
        let session = Arc::new(WatchSession::with_path(temp_dir.path()));
        session
            .queue()
            .push(ChangeRecord::new(ChangeType::Deleted, temp_dir.path().join("a")));
        session
            .queue()
            .push(ChangeRecord::new(ChangeType::Deleted, temp_dir.path().join("b")));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

        let task = tokio::spawn(drain(
            Arc::clone(&session),
            Duration::from_millis(20),
            shutdown_rx,
            move |record| {
                let _ = seen_tx.send(record);
            },
        ));

        let first = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name(), "a");
        assert_eq!(second.name(), "b");
        assert!(session.is_running());

        shutdown_tx.send(true).unwrap();
        let stats = task.await.unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.reopened, 0);
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_drain_recovers_after_fault() {
        let temp_dir = TempDir::new().unwrap();
        let session = Arc::new(WatchSession::with_path(temp_dir.path()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drain(
            Arc::clone(&session),
            Duration::from_millis(20),
            shutdown_rx,
            |_| {},
        ));

        // Wait for the first open
        for _ in 0..250 {
            if session.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(session.inject_fault("drill"));

        // The second activation is the consumer's reopen
        let mut recovered = false;
        for _ in 0..250 {
            if session.activations() == 2 && session.is_running() {
                recovered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        shutdown_tx.send(true).unwrap();
        let stats = task.await.unwrap();

        assert!(recovered);
        assert_eq!(stats.reopened, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_open_and_close_leave_the_runtime_free() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let temp_dir = TempDir::new().unwrap();
        let session = Arc::new(WatchSession::with_path(temp_dir.path().join("tree")));

        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drain(
            Arc::clone(&session),
            Duration::from_millis(20),
            shutdown_rx,
            |_| {},
        ));

        for _ in 0..250 {
            if session.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(session.is_running());

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert!(!session.is_running());
        assert!(ticks.load(Ordering::Relaxed) > 0);

        ticker.abort();
    }
}
