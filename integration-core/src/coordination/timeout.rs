//! Bounding a future's wall-clock time without forcibly terminating it.

use std::future::Future;
use std::time::Duration;

/// Returned when `operation` did not complete within `duration`.
///
/// Calling this a "timeout" rather than a "cancellation" is deliberate: the
/// underlying future is dropped, but if it had already handed off work to a
/// detached task (e.g. spawned a subprocess and is awaiting its exit), that
/// work keeps running. Callers whose operations can leak in this way must
/// pair this with their own cancellation signal.
#[derive(Debug)]
pub struct Elapsed;

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for Elapsed {}

/// Races `future` against `duration`, returning `Err(Elapsed)` if the
/// duration elapses first.
pub async fn timeout<F, T>(duration: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| Elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_value_when_operation_finishes_in_time() {
        let result = timeout(Duration::from_millis(50), async { 42 }).await;
        assert!(matches!(result, Ok(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn elapses_when_operation_is_slower_than_duration() {
        let operation = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        };
        let result = timeout(Duration::from_millis(50), operation).await;
        assert!(result.is_err());
    }
}
