//! Background defence of the override against external edits.
//!
//! One task per override session. It watches the live resolver file, and
//! on any change unregisters itself, waits out a quiet interval to let
//! bursts of edits settle, reasserts the override and starts watching
//! again.
//!
//! ```text
//!  Starting ──▶ Watching ──event──▶ Debouncing ──quiet──▶ (reassert) ──▶ Watching
//!                   │                    │
//!                   └──────cancel────────┴──────────▶ Stopped
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Where the monitor task currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Spawned; the watch is not registered yet.
    Starting,
    /// Waiting for a change to the live file.
    Watching,
    /// A change was seen; waiting for the quiet interval to elapse.
    Debouncing,
    /// The task has exited.
    Stopped,
}

/// Handle to a running monitor task.
///
/// Stopping is advisory: it cancels the task at its next suspension point
/// and is a no-op once the task has already exited.
#[derive(Debug)]
pub struct MonitorSession {
    cancel_token: CancellationToken,
    state: watch::Receiver<MonitorState>,
    join_handle: JoinHandle<()>,
}

impl MonitorSession {
    /// Requests the task to stop.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Returns the task's current state.
    #[must_use]
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.clone()
    }

    /// Returns `true` once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Waits for the task to exit.
    pub async fn wait(self) {
        if let Err(e) = self.join_handle.await {
            tracing::error!("Failed to join on DNS monitor handle: {}", e);
        }
    }
}

/// Watches one path and calls `reassert` after each burst of changes.
///
/// `reassert` runs on the blocking pool. It receives the session's token
/// and returns `Ok(false)` if it observed cancellation and did nothing,
/// which ends the task.
pub struct ChangeMonitor<F> {
    path: PathBuf,
    debounce: Duration,
    reassert: Arc<F>,
    cancel_token: CancellationToken,
    state: watch::Sender<MonitorState>,
}

impl<F> ChangeMonitor<F>
where
    F: Fn(&CancellationToken) -> Result<bool> + Send + Sync + 'static,
{
    /// Spawns the monitor on `runtime`.
    pub fn start(
        runtime: &Handle,
        path: impl Into<PathBuf>,
        debounce: Duration,
        reassert: F,
    ) -> MonitorSession {
        let cancel_token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(MonitorState::Starting);
        let monitor = Self {
            path: path.into(),
            debounce,
            reassert: Arc::new(reassert),
            cancel_token: cancel_token.clone(),
            state: state_tx,
        };
        let join_handle = runtime.spawn(monitor.run());

        MonitorSession {
            cancel_token,
            state: state_rx,
            join_handle,
        }
    }

    async fn run(self) {
        if let Err(e) = self.run_inner().await {
            tracing::error!(path = %self.path.display(), error = %e, "DNS-change monitoring failed");
        }
        self.state.send_replace(MonitorState::Stopped);
        tracing::info!(path = %self.path.display(), "DNS-change monitoring stopped");
    }

    async fn run_inner(&self) -> Result<()> {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone once the task exits.
            let _ = events_tx.send(res);
        })?;
        tracing::info!(path = %self.path.display(), "DNS-change monitoring started");

        loop {
            watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
            self.state.send_replace(MonitorState::Watching);

            let kind = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => return Ok(()),
                kind = next_change(&mut events) => match kind {
                    Some(kind) => kind,
                    None => return Ok(()),
                },
            };

            // Our own rewrite must not wake us up again.
            if let Err(e) = watcher.unwatch(&self.path) {
                tracing::warn!(error = %e, "Failed to remove DNS file watch");
            }
            self.state.send_replace(MonitorState::Debouncing);

            if self
                .cancel_token
                .run_until_cancelled(tokio::time::sleep(self.debounce))
                .await
                .is_none()
            {
                return Ok(());
            }

            // Coalesce whatever else arrived during the quiet interval.
            while events.try_recv().is_ok() {}

            tracing::info!(
                path = %self.path.display(),
                ?kind,
                "DNS was changed outside of the daemon, restoring"
            );
            match self.reassert_off_runtime().await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => tracing::error!(error = %e, "Failed to reassert DNS override"),
            }
        }
    }

    /// Runs `reassert` off the async workers: it takes a blocking lock and
    /// syncs the file to disk.
    async fn reassert_off_runtime(&self) -> Result<bool> {
        let reassert = Arc::clone(&self.reassert);
        let cancel_token = self.cancel_token.clone();
        match tokio::task::spawn_blocking(move || (*reassert)(&cancel_token)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Failed to join on DNS reassert task: {}", e);
                Ok(true)
            }
        }
    }
}

/// Waits for the next event that indicates the file content or identity
/// changed. Returns `None` if the watcher went away.
async fn next_change(
    events: &mut mpsc::UnboundedReceiver<notify::Result<Event>>,
) -> Option<EventKind> {
    while let Some(res) = events.recv().await {
        match res {
            Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
            Ok(event) => return Some(event.kind),
            Err(e) => tracing::warn!(error = %e, "DNS file watcher reported an error"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn wait_for(rx: &mut watch::Receiver<MonitorState>, state: MonitorState) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for monitor state")
            .unwrap();
    }

    fn counting_reassert(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(&CancellationToken) -> Result<bool> + Send + Sync + 'static {
        move |token: &CancellationToken| {
            if token.is_cancelled() {
                return Ok(false);
            }
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn burst_of_edits_reasserts_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 10.0.0.1\n").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let session = ChangeMonitor::start(
            &Handle::current(),
            &path,
            Duration::from_millis(300),
            counting_reassert(Arc::clone(&calls)),
        );
        let mut rx = session.subscribe();
        wait_for(&mut rx, MonitorState::Watching).await;

        std::fs::write(&path, "nameserver 1.1.1.1\n").unwrap();
        wait_for(&mut rx, MonitorState::Debouncing).await;
        std::fs::write(&path, "nameserver 1.0.0.1\n").unwrap();
        std::fs::write(&path, "nameserver 9.9.9.9\n").unwrap();

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), MonitorState::Watching);

        session.stop();
        wait_for(&mut rx, MonitorState::Stopped).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_during_debounce_skips_reassert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 10.0.0.1\n").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let session = ChangeMonitor::start(
            &Handle::current(),
            &path,
            Duration::from_millis(300),
            counting_reassert(Arc::clone(&calls)),
        );
        let mut rx = session.subscribe();
        wait_for(&mut rx, MonitorState::Watching).await;

        std::fs::write(&path, "nameserver 1.1.1.1\n").unwrap();
        wait_for(&mut rx, MonitorState::Debouncing).await;
        session.stop();
        wait_for(&mut rx, MonitorState::Stopped).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.is_finished());
        session.wait().await;
    }

    #[tokio::test(flavor = "current_thread")]
    #[allow(clippy::await_holding_lock)]
    async fn blocked_reassert_does_not_stall_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 10.0.0.1\n").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let lock = Arc::new(std::sync::Mutex::new(()));

        let reassert = {
            let calls = Arc::clone(&calls);
            let lock = Arc::clone(&lock);
            move |token: &CancellationToken| -> Result<bool> {
                let _guard = lock.lock().unwrap();
                if token.is_cancelled() {
                    return Ok(false);
                }
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        };
        let session = ChangeMonitor::start(
            &Handle::current(),
            &path,
            Duration::from_millis(100),
            reassert,
        );
        let mut rx = session.subscribe();
        wait_for(&mut rx, MonitorState::Watching).await;

        // Hold the lock like a slow controller call. The single runtime
        // thread must keep running timers while the reassert waits on it.
        let guard = lock.lock().unwrap();
        std::fs::write(&path, "nameserver 1.1.1.1\n").unwrap();
        wait_for(&mut rx, MonitorState::Debouncing).await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(guard);

        wait_for(&mut rx, MonitorState::Watching).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        session.stop();
        wait_for(&mut rx, MonitorState::Stopped).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_path_ends_task() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let session = ChangeMonitor::start(
            &Handle::current(),
            dir.path().join("missing.conf"),
            Duration::from_millis(100),
            counting_reassert(Arc::clone(&calls)),
        );
        let mut rx = session.subscribe();
        wait_for(&mut rx, MonitorState::Stopped).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Stopping a finished session is a no-op.
        session.stop();
        session.wait().await;
    }
}
