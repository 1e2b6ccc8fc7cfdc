//! Circuit breaker: stops issuing calls to a failing dependency until it
//! appears healthy again.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// The three states a breaker can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Rejected-call error distinguishing a breaker rejection from the wrapped
/// operation's own error.
#[derive(Debug)]
pub enum CircuitCallError<E> {
    /// The breaker is open (or just transitioned from open) and rejected the call.
    Open,
    Operation(E),
}

type StateChangeCallback = Arc<dyn Fn(BreakerState, BreakerState) + Send + Sync>;

pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    success_threshold: u32,
    inner: Mutex<Inner>,
    on_state_change: Option<StateChangeCallback>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_timeout: Duration, success_threshold: u32) -> Self {
        Self {
            failure_threshold,
            open_timeout,
            success_threshold,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
            on_state_change: None,
        }
    }

    pub fn with_state_change_callback(
        mut self,
        callback: impl Fn(BreakerState, BreakerState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(callback));
        self
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("circuit breaker poisoned").state
    }

    /// Runs `operation` if the breaker currently allows it, recording the
    /// outcome against the breaker's state machine.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CircuitCallError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(CircuitCallError::Operation(error))
            }
        }
    }

    /// Returns whether a call is currently allowed, transitioning
    /// Open → HalfOpen as a side effect once `open_timeout` has elapsed.
    fn admit(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.open_timeout {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    inner.failure_count = 0;
                    inner.consecutive_successes = 0;
                    self.transition(&mut inner, BreakerState::Closed);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.opened_at = Some(Instant::now());
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                inner.failure_count = 0;
                inner.consecutive_successes = 0;
                inner.opened_at = Some(Instant::now());
                self.transition(&mut inner, BreakerState::Open);
            }
            BreakerState::Open => {}
        }
    }

    /// Caller must hold the lock. Runs the state-change callback, if any, on
    /// an independent task so it cannot block the breaker.
    fn transition(&self, inner: &mut Inner, new_state: BreakerState) {
        let old_state = inner.state;
        inner.state = new_state;
        if old_state == new_state {
            return;
        }
        match new_state {
            BreakerState::Open => warn!(?old_state, ?new_state, "circuit breaker opened"),
            _ => info!(?old_state, ?new_state, "circuit breaker state change"),
        }
        if let Some(callback) = self.on_state_change.clone() {
            tokio::spawn(async move {
                callback(old_state, new_state);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(2, Duration::from_millis(100), 1);

        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        let result = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitCallError::Open)));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50), 2);

        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_millis(60)).await;

        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50), 2);
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        tokio::time::advance(Duration::from_millis(60)).await;

        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        let _ = breaker.call(|| async { Err::<(), _>("boom again") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
