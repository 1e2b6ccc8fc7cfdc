//! Debouncer: coalesces a burst of calls into a single callback invocation
//! after a quiet period.
//!
//! The tricky part is timer supersession: `Stop`/`CallNow`/a later `Call`
//! cannot reach into a timer task that has already started running. Instead
//! every arm captures a monotonically increasing sequence stamp; the timer
//! task only fires if, under the shared lock, its stamp still matches the
//! latest one armed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::trace;

struct State {
    sequence: u64,
    pending: bool,
}

/// Debounces calls to a callback: repeated [`Debouncer::call`] invocations
/// within `delay` reset the timer, so the callback only runs once the calls
/// stop for at least `delay`.
pub struct Debouncer {
    delay: Duration,
    state: Arc<Mutex<State>>,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl Debouncer {
    pub fn new(delay: Duration, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(State {
                sequence: 0,
                pending: false,
            })),
            callback: Arc::new(callback),
        }
    }

    /// Arms (or re-arms) the quiet-period timer.
    pub fn call(&self) {
        let armed_sequence = {
            let mut state = self.state.lock().expect("debouncer state poisoned");
            state.sequence += 1;
            state.pending = true;
            state.sequence
        };

        let state = Arc::clone(&self.state);
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let fire = {
                let mut state = state.lock().expect("debouncer state poisoned");
                if state.pending && state.sequence == armed_sequence {
                    state.pending = false;
                    true
                } else {
                    trace!(armed_sequence, "debounce timer superseded, not firing");
                    false
                }
            };
            if fire {
                callback();
            }
        });
    }

    /// Fires the callback immediately if a call is pending, cancelling the
    /// timer. No-op if nothing is pending.
    pub fn call_now(&self) {
        let fire = {
            let mut state = self.state.lock().expect("debouncer state poisoned");
            if state.pending {
                state.sequence += 1;
                state.pending = false;
                true
            } else {
                false
            }
        };
        if fire {
            (self.callback)();
        }
    }

    /// Drops any pending call without firing.
    pub fn cancel(&self) {
        let mut state = self.state.lock().expect("debouncer state poisoned");
        state.sequence += 1;
        state.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().expect("debouncer state poisoned").pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn coalesces_a_burst_into_one_call() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = Arc::clone(&counter);
        let debouncer = Debouncer::new(Duration::from_millis(50), move || {
            counter_cb.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..10 {
            debouncer.call();
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        tokio::time::advance(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn call_now_fires_immediately_and_cancels_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = Arc::clone(&counter);
        let debouncer = Debouncer::new(Duration::from_millis(50), move || {
            counter_cb.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.call();
        debouncer.call_now();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        // The superseded timer must not fire a second time.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_call_silently() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = Arc::clone(&counter);
        let debouncer = Debouncer::new(Duration::from_millis(50), move || {
            counter_cb.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.call();
        debouncer.cancel();
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }
}
