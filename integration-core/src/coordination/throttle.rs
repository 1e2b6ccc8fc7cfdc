//! Throttler: limits a callback to firing at most once per interval, with
//! independently configurable leading and trailing edges.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

struct State {
    last_invoke: Option<Instant>,
    timer_armed: bool,
    sequence: u64,
}

/// Rate-limits calls to a callback. `leading` fires on the first call of a
/// burst; `trailing` arms a timer so the burst's last call is still honored
/// once the interval elapses. Both may be enabled together.
pub struct Throttler {
    interval: Duration,
    leading: bool,
    trailing: bool,
    state: Arc<Mutex<State>>,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl Throttler {
    pub fn new(
        interval: Duration,
        leading: bool,
        trailing: bool,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            interval,
            leading,
            trailing,
            state: Arc::new(Mutex::new(State {
                last_invoke: None,
                timer_armed: false,
                sequence: 0,
            })),
            callback: Arc::new(callback),
        }
    }

    pub fn call(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().expect("throttler state poisoned");

        let due = match state.last_invoke {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if due && self.leading {
            state.last_invoke = Some(now);
            drop(state);
            let callback = Arc::clone(&self.callback);
            tokio::spawn(async move {
                callback();
            });
            return;
        }

        if self.trailing && !state.timer_armed {
            state.timer_armed = true;
            state.sequence += 1;
            let armed_sequence = state.sequence;
            let remainder = match state.last_invoke {
                Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
                None => self.interval,
            };

            let state_handle = Arc::clone(&self.state);
            let callback = Arc::clone(&self.callback);
            tokio::spawn(async move {
                tokio::time::sleep(remainder).await;
                let fire = {
                    let mut state = state_handle.lock().expect("throttler state poisoned");
                    if state.timer_armed && state.sequence == armed_sequence {
                        state.timer_armed = false;
                        state.last_invoke = Some(Instant::now());
                        true
                    } else {
                        trace!(armed_sequence, "throttle timer superseded, not firing");
                        false
                    }
                };
                if fire {
                    callback();
                }
            });
        }
    }

    /// Clears the last-call timestamp so the next call is treated as leading.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("throttler state poisoned");
        state.last_invoke = None;
        state.timer_armed = false;
        state.sequence += 1;
    }
}
