//! Small, independently-testable concurrency primitives used by the rest of
//! the crate: debouncing, throttling, TTL caching, cooperative cancellation,
//! retry with backoff, a circuit breaker, bounded timeouts, and panic-safe
//! task spawning.

pub mod cancellation;
pub mod circuit_breaker;
pub mod debounce;
pub mod retry;
pub mod task;
pub mod throttle;
pub mod timeout;
pub mod ttl_cache;

pub use cancellation::CancellationToken;
pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitCallError};
pub use debounce::Debouncer;
pub use retry::{retry, RetryConfig, RetryError};
pub use task::spawn_guarded;
pub use throttle::Throttler;
pub use timeout::{timeout, Elapsed};
pub use ttl_cache::TtlCache;
