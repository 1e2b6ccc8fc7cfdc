//! A minimal cancellation signal shared by retry, timeout, and the manager's
//! shutdown context.

use tokio::sync::watch;

/// A cheaply-cloneable cancellation flag, backed by a `watch` channel rather
/// than a bare `Notify`: `Notify::notify_waiters` only wakes tasks already
/// parked at the moment it runs, so a waiter registering between the
/// `is_cancelled` check and the wait itself would hang forever. `watch`
/// stores the latest value and a version counter, so a receiver created (or
/// polled) after the send still observes it — no missed-wakeup window.
#[derive(Clone)]
pub struct CancellationToken {
    sender: std::sync::Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: std::sync::Arc::new(sender),
        }
    }

    /// Cancels the token. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_if_modified(|cancelled| {
            let was_cancelled = *cancelled;
            *cancelled = true;
            !was_cancelled
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the token is cancelled. Resolves immediately if it
    /// already was, even if the cancellation happened before this call
    /// started waiting.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
