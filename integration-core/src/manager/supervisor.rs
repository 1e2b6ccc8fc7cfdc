//! Registry of long-lived child processes started by feature subsystems,
//! with bounded, escalating shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};

struct Registration {
    child: Child,
}

/// Sends the least severe termination signal this platform exposes.
/// `SIGTERM` on unix (via `nix`, since `tokio::process::Child::start_kill`
/// always issues `SIGKILL`); `start_kill` itself elsewhere.
fn send_soft_signal(child: &Child, name: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        match child.id() {
            Some(pid) => {
                if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    warn!(name, %err, "supervisor: SIGTERM failed, proceeding to wait");
                }
            }
            None => debug!(name, "supervisor: child already exited, nothing to signal"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = name;
        let _ = child;
    }
}

/// Tracks named child processes. `stop` signals termination and awaits it
/// with a bounded grace period, escalating from a soft signal to a hard
/// kill if the process ignores the former.
pub struct Supervisor {
    children: Mutex<HashMap<String, Registration>>,
    grace_period: Duration,
    max_children: usize,
}

impl Supervisor {
    pub fn new(grace_period: Duration, max_children: usize) -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
            grace_period,
            max_children,
        }
    }

    /// Registers `child` under `name`. A previous registration with the
    /// same name is replaced without being stopped — callers that care must
    /// `stop` it themselves first. Rejects the registration, leaving `child`
    /// to the caller, once the configured maximum is already reached and
    /// `name` is not itself a replacement of an existing registration.
    pub async fn start(&self, name: impl Into<String>, child: Child) -> Result<()> {
        let name = name.into();
        let mut children = self.children.lock().await;
        if !children.contains_key(&name) && children.len() >= self.max_children {
            warn!(
                name = %name,
                max_children = self.max_children,
                "supervisor: rejecting registration, at capacity"
            );
            return Err(Error::conflict(format!(
                "supervisor is at its configured limit of {} processes",
                self.max_children
            )));
        }
        debug!(name = %name, "supervisor: child registered");
        children.insert(name, Registration { child });
        Ok(())
    }

    /// Signals termination and awaits exit within the grace period,
    /// escalating from a soft signal (`SIGTERM` on unix, `kill` elsewhere —
    /// delegated to [`Child::start_kill`]) to a hard kill on timeout.
    /// Removing an unregistered name is a no-op.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let mut registration = match self.children.lock().await.remove(name) {
            Some(registration) => registration,
            None => return Ok(()),
        };

        send_soft_signal(&registration.child, name);

        let waited = tokio::time::timeout(self.grace_period, registration.child.wait()).await;
        match waited {
            Ok(Ok(_status)) => {
                debug!(name, "supervisor: child exited within grace period");
                Ok(())
            }
            Ok(Err(err)) => Err(Error::from(err).context("supervisor stop: wait failed")),
            Err(_) => {
                warn!(name, "supervisor: grace period elapsed, escalating to hard kill");
                registration
                    .child
                    .kill()
                    .await
                    .map_err(|err| Error::from(err).context("supervisor stop: hard kill"))?;
                Ok(())
            }
        }
    }

    /// Stops every registered child, collecting but not short-circuiting on
    /// individual failures.
    pub async fn stop_all(&self) -> Result<()> {
        let names: Vec<String> = self.children.lock().await.keys().cloned().collect();
        let mut first_error = None;
        for name in names {
            if let Err(err) = self.stop(&name).await {
                warn!(name, error = %err, "supervisor: failed to stop child during stop_all");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn count(&self) -> usize {
        self.children.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_sleeper(seconds: u64) -> Child {
        tokio::process::Command::new("sleep")
            .arg(seconds.to_string())
            .kill_on_drop(true)
            .spawn()
            .expect("sleep should spawn")
    }

    #[tokio::test]
    async fn count_reflects_active_registrations() {
        let supervisor = Arc::new(Supervisor::new(Duration::from_secs(2), 64));
        supervisor.start("a", spawn_sleeper(30)).await.unwrap();
        supervisor.start("b", spawn_sleeper(30)).await.unwrap();
        assert_eq!(supervisor.count().await, 2);

        supervisor.stop("a").await.unwrap();
        assert_eq!(supervisor.count().await, 1);

        supervisor.stop_all().await.unwrap();
        assert_eq!(supervisor.count().await, 0);
    }

    #[tokio::test]
    async fn stopping_an_unregistered_name_is_a_no_op() {
        let supervisor = Supervisor::new(Duration::from_secs(1), 64);
        supervisor.stop("missing").await.unwrap();
    }

    #[tokio::test]
    async fn start_rejects_past_the_configured_maximum() {
        let supervisor = Supervisor::new(Duration::from_secs(1), 1);
        supervisor.start("a", spawn_sleeper(30)).await.unwrap();
        let err = supervisor.start("b", spawn_sleeper(30)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert_eq!(supervisor.count().await, 1);
    }

    #[tokio::test]
    async fn start_allows_replacing_an_existing_name_at_capacity() {
        let supervisor = Supervisor::new(Duration::from_secs(1), 1);
        supervisor.start("a", spawn_sleeper(30)).await.unwrap();
        supervisor.start("a", spawn_sleeper(30)).await.unwrap();
        assert_eq!(supervisor.count().await, 1);
    }
}
