//! Spawning a task with a named identity and a panic boundary, so a bug in
//! one background job cannot silently vanish or take anything else down.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawns `future` on the tokio runtime under `name`. If it panics, the
/// panic is caught, logged, and handed to `on_panic` (if given) rather than
/// propagating through the `JoinHandle`. Returns `None` from the handle on
/// panic, `Some(value)` otherwise.
pub fn spawn_guarded<F, T>(
    name: impl Into<String>,
    future: F,
    on_panic: Option<Arc<dyn Fn(&str, &str) + Send + Sync>>,
) -> JoinHandle<Option<T>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();
    tokio::spawn(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(value) => Some(value),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(task = %name, panic = %message, "guarded task panicked");
                if let Some(callback) = on_panic {
                    callback(&name, &message);
                }
                None
            }
        }
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
