//! Retry with exponential backoff and cooperative cancellation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::cancellation::CancellationToken;

/// Configuration for [`retry`].
#[derive(Clone)]
pub struct RetryConfig<E> {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Returns `true` if `error` should be retried. Defaults to "always
    /// retryable" when unset.
    pub retryable: Option<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
}

impl<E> RetryConfig<E> {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            retryable: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_retryable(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.retryable = Some(Arc::new(predicate));
        self
    }

    fn is_retryable(&self, error: &E) -> bool {
        match &self.retryable {
            Some(predicate) => predicate(error),
            None => true,
        }
    }
}

/// The outcome of an exhausted or cancelled retry loop.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation's own error, after either exhausting attempts or
    /// encountering a non-retryable error.
    Operation(E),
    /// The cancellation context fired before a result was produced.
    Cancelled,
}

/// Calls `operation` up to `config.max_attempts` times. Sleeps between
/// attempts with exponential backoff (saturating at `max_delay`). Returns
/// immediately, without sleeping, when the error is not retryable or the
/// cancellation token fires.
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig<E>,
    cancellation: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if cancellation.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !config.is_retryable(&error) {
                    debug!(attempt, "retry: non-retryable error, returning immediately");
                    return Err(RetryError::Operation(error));
                }
                if attempt >= config.max_attempts {
                    warn!(attempt, "retry: attempts exhausted");
                    return Err(RetryError::Operation(error));
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancellation.cancelled() => return Err(RetryError::Cancelled),
                }

                let next = (delay.as_secs_f64() * config.multiplier).min(config.max_delay.as_secs_f64());
                delay = Duration::from_secs_f64(next);
            }
        }
    }
}
