//! Typed configuration for the integration runtime.
//!
//! Every configurable component gets its own struct with a [`Default`] impl
//! reflecting the defaults named in the specification, and a fluent
//! `with_*` builder. [`ManagerConfig`] is the one surface meant to be loaded
//! from outside the process (a config file, an editor setting); it derives
//! `serde(deny_unknown_fields)` so that unknown keys are rejected at the
//! boundary rather than silently ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validation::validate_key_path;

fn default_workspace_root() -> String {
    ".".to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

fn default_max_supervised_processes() -> usize {
    64
}

fn default_status_cache_ttl_ms() -> u64 {
    1_000
}

/// Top-level configuration recognised by the [`Manager`](crate::manager::Manager).
///
/// Unknown fields are rejected when deserialized from an external source
/// (`serde(deny_unknown_fields)`), matching the "Unknown configuration is
/// rejected" contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// Workspace root the runtime operates against.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
    /// Bound on how long `close()` waits for subsystems to finish (default: 5s).
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Maximum number of child processes the supervisor will track (default: 64).
    #[serde(default = "default_max_supervised_processes")]
    pub max_supervised_processes: usize,
    /// Default TTL for repository status caches spawned under this manager (default: 1s).
    #[serde(default = "default_status_cache_ttl_ms")]
    pub status_cache_ttl_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            max_supervised_processes: default_max_supervised_processes(),
            status_cache_ttl_ms: default_status_cache_ttl_ms(),
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_supervised_processes(mut self, max: usize) -> Self {
        self.max_supervised_processes = max;
        self
    }

    pub fn with_status_cache_ttl(mut self, ttl: Duration) -> Self {
        self.status_cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn status_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.status_cache_ttl_ms)
    }
}

/// Configuration for a [`Repository`](crate::vcs::repository::Repository) facade.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// How long a cached [`RepositoryStatus`](crate::vcs::RepositoryStatus)
    /// snapshot remains fresh before a `status()` call re-queries (default: 1s).
    pub status_cache_ttl: Duration,
    /// Path to an SSH private key used for `git` operations against a remote,
    /// passed to the subprocess via `core.sshCommand` rather than the
    /// ambient `ssh-agent`. `None` leaves `git` to its own SSH configuration.
    pub ssh_key_path: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            status_cache_ttl: Duration::from_secs(1),
            ssh_key_path: None,
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_cache_ttl(mut self, ttl: Duration) -> Self {
        self.status_cache_ttl = ttl;
        self
    }

    /// Validated the same way every key-file path is ([`validate_key_path`]):
    /// rejected if it contains control characters, shell metacharacters, a
    /// `..` traversal segment, or is neither absolute nor `~`-relative.
    pub fn with_ssh_key_path(mut self, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        validate_key_path(&path)?;
        self.ssh_key_path = Some(path);
        Ok(self)
    }
}

/// Configuration for a [`StatusWatcher`](crate::vcs::watcher::StatusWatcher).
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Polling interval between snapshot comparisons (default: 2s).
    pub interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

impl WatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ManagerConfig::default();
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.max_supervised_processes, 64);
        assert_eq!(cfg.status_cache_ttl(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = serde_json::json!({
            "workspaceRoot": "/tmp",
            "bogusField": true,
        });
        // Field names are snake_case on this struct (no rename), so even a
        // plausible-looking unknown key must be rejected.
        let err = serde_json::from_value::<ManagerConfig>(json).unwrap_err();
        assert!(err.to_string().contains("unknown field") || err.is_data());
    }

    #[test]
    fn builder_round_trips() {
        let cfg = ManagerConfig::new()
            .with_workspace_root("/repo")
            .with_shutdown_timeout(Duration::from_millis(250))
            .with_max_supervised_processes(4)
            .with_status_cache_ttl(Duration::from_millis(10));
        assert_eq!(cfg.workspace_root, "/repo");
        assert_eq!(cfg.shutdown_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.max_supervised_processes, 4);
        assert_eq!(cfg.status_cache_ttl(), Duration::from_millis(10));
    }

    #[test]
    fn ssh_key_path_must_be_absolute() {
        assert!(RepositoryConfig::new().with_ssh_key_path("id_rsa").is_err());
        let cfg = RepositoryConfig::new()
            .with_ssh_key_path("/home/user/.ssh/id_rsa")
            .unwrap();
        assert_eq!(cfg.ssh_key_path.as_deref(), Some("/home/user/.ssh/id_rsa"));
    }
}
