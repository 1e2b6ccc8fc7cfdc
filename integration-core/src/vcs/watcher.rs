//! Polling observer: periodically re-queries a [`Repository`]'s status and
//! invokes registered callbacks when the snapshot has actually changed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::config::WatcherConfig;
use crate::vcs::repository::StatusSource;
use crate::vcs::status_parser::RepositoryStatus;

type ChangeCallback = Arc<dyn Fn(&RepositoryStatus) + Send + Sync>;

/// Owns no thread by itself: [`StatusWatcher::start`] spawns one polling
/// task per `start` call, torn down by [`StatusWatcher::stop`].
pub struct StatusWatcher {
    source: Arc<dyn StatusSource>,
    config: WatcherConfig,
    callbacks: Mutex<Vec<ChangeCallback>>,
    last_observed: Mutex<Option<RepositoryStatus>>,
    running: AtomicBool,
    generation: AtomicU64,
    shutdown: Mutex<Arc<Notify>>,
}

impl StatusWatcher {
    pub fn new(source: Arc<dyn StatusSource>, config: WatcherConfig) -> Self {
        Self {
            source,
            config,
            callbacks: Mutex::new(Vec::new()),
            last_observed: Mutex::new(None),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            shutdown: Mutex::new(Arc::new(Notify::new())),
        }
    }

    pub async fn on_change(&self, callback: impl Fn(&RepositoryStatus) + Send + Sync + 'static) {
        self.callbacks.lock().await.push(Arc::new(callback));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Idempotent: a second `start` while already running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let shutdown = Arc::new(Notify::new());
        *self.shutdown.lock().await = Arc::clone(&shutdown);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let watcher = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(watcher.config.interval) => {
                        if watcher.generation.load(Ordering::SeqCst) != generation {
                            return;
                        }
                        watcher.poll_once().await;
                    }
                    _ = shutdown.notified() => {
                        debug!("status watcher stopped");
                        return;
                    }
                }
            }
        });
    }

    /// Idempotent: stopping an already-stopped watcher is a no-op. A
    /// subsequent `start` arms a fresh shutdown channel.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.lock().await.notify_waiters();
    }

    async fn poll_once(&self) {
        let status = match self.source.refresh_status().await {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, "status watcher poll failed");
                return;
            }
        };

        let mut last = self.last_observed.lock().await;
        let changed = match last.as_ref() {
            None => true,
            Some(previous) => previous != &status,
        };

        if changed {
            let callbacks = self.callbacks.lock().await;
            for callback in callbacks.iter() {
                callback(&status);
            }
        }
        *last = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Hands out a canned sequence of snapshots, one per call, so these
    /// tests never depend on a real `git` binary (per the test-harness
    /// convention for facade/parser tests).
    struct FixtureSource {
        snapshots: StdMutex<std::collections::VecDeque<RepositoryStatus>>,
    }

    impl FixtureSource {
        fn new(snapshots: Vec<RepositoryStatus>) -> Self {
            Self {
                snapshots: StdMutex::new(snapshots.into()),
            }
        }
    }

    impl StatusSource for FixtureSource {
        fn refresh_status(&self) -> BoxFuture<'_, crate::error::Result<RepositoryStatus>> {
            let next = self
                .snapshots
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Box::pin(async move { Ok(next) })
        }
    }

    fn status_with_untracked(paths: &[&str]) -> RepositoryStatus {
        RepositoryStatus {
            untracked: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn change_detection_fires_once_per_distinct_snapshot() {
        let source: Arc<dyn StatusSource> = Arc::new(FixtureSource::new(vec![
            status_with_untracked(&["a.txt"]),
            status_with_untracked(&["a.txt", "b.txt"]),
            status_with_untracked(&["a.txt", "b.txt"]),
        ]));
        let watcher = Arc::new(StatusWatcher::new(source, WatcherConfig::new()));

        let observed: Arc<StdMutex<Vec<RepositoryStatus>>> = Arc::new(StdMutex::new(Vec::new()));
        let observed_cb = Arc::clone(&observed);
        watcher
            .on_change(move |status| observed_cb.lock().unwrap().push(status.clone()))
            .await;

        watcher.poll_once().await; // first observation: always a change
        watcher.poll_once().await; // untracked set grew: a change
        watcher.poll_once().await; // identical snapshot: no change

        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 2);
        assert_eq!(observed[1].untracked, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let source: Arc<dyn StatusSource> = Arc::new(FixtureSource::new(Vec::new()));
        let watcher = Arc::new(StatusWatcher::new(source, WatcherConfig::new()));

        watcher.start().await;
        watcher.start().await;
        assert!(watcher.is_running());

        watcher.stop().await;
        watcher.stop().await;
        assert!(!watcher.is_running());
    }
}
