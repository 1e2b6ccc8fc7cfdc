//! Repository facade: a TTL-cached status snapshot plus a small set of
//! mutating operations that invalidate the cache and announce themselves on
//! the event bus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::RepositoryConfig;
use crate::coordination::CancellationToken;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::process::ExecCommand;
use crate::validation::validate_path;
use crate::vcs::status_parser::{self, RepositoryStatus};

/// The capability the status watcher depends on, so it can be driven by a
/// fixture in tests instead of shelling out to a real `git` binary.
pub trait StatusSource: Send + Sync {
    fn refresh_status(&self) -> BoxFuture<'_, Result<RepositoryStatus>>;
}

struct Cached {
    status: RepositoryStatus,
    fetched_at: Instant,
}

/// Owns one working tree. Reads (`status`) take the shared side of an
/// `RwLock`; mutations take the exclusive side, so a mutation never races a
/// concurrent status read.
pub struct Repository {
    root: String,
    config: RepositoryConfig,
    cache: RwLock<Option<Cached>>,
    bus: Option<Arc<EventBus>>,
}

impl Repository {
    pub fn new(root: impl Into<String>, config: RepositoryConfig) -> Self {
        Self {
            root: root.into(),
            config,
            cache: RwLock::new(None),
            bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn set_status_cache_ttl(&mut self, ttl: Duration) {
        self.config.status_cache_ttl = ttl;
    }

    /// Serves the cached snapshot if present and younger than the
    /// configured TTL; otherwise re-queries and repopulates the cache.
    pub async fn status(&self) -> Result<RepositoryStatus> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.config.status_cache_ttl {
                    return Ok(cached.status.clone());
                }
            }
        }
        self.refresh_status().await
    }

    /// Bypasses the cache and overwrites it with a fresh query.
    pub async fn refresh_status(&self) -> Result<RepositoryStatus> {
        let status = self.query_status().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(Cached {
            status: status.clone(),
            fetched_at: Instant::now(),
        });
        Ok(status)
    }

    /// Looks up a single path's change entry from a fresh status snapshot.
    pub async fn path_status(&self, path: &str) -> Result<Option<status_parser::FileChange>> {
        let status = self.status().await?;
        Ok(status
            .staged
            .into_iter()
            .chain(status.unstaged)
            .find(|change| change.path == path))
    }

    /// Builds a `git` invocation rooted at this repository, prefixed with a
    /// `core.sshCommand` override when [`RepositoryConfig::ssh_key_path`] is
    /// set, so every query and mutation goes through the same configured key
    /// rather than the ambient `ssh-agent`.
    fn git<I, S>(&self, args: I) -> ExecCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut full_args = Vec::new();
        if let Some(key_path) = &self.config.ssh_key_path {
            full_args.push("-c".to_string());
            full_args.push(format!("core.sshCommand=ssh -i {key_path}"));
        }
        full_args.extend(args.into_iter().map(Into::into));
        ExecCommand::new("git", full_args).with_working_dir(self.root.clone())
    }

    async fn query_status(&self) -> Result<RepositoryStatus> {
        let cancellation = CancellationToken::new();

        let porcelain = self
            .git(["status", "--porcelain=v2", "--branch", "--untracked-files=all"])
            .run(&cancellation)
            .await
            .map_err(|err| err.context("repository status query"))?;
        let porcelain_text = String::from_utf8_lossy(&porcelain);
        let (staged, unstaged, untracked, conflicts) = status_parser::parse_changes(&porcelain_text);

        let branch_raw = self
            .git(["rev-parse", "--abbrev-ref", "HEAD"])
            .run(&cancellation)
            .await
            .map_err(|err| err.context("repository branch query"))?;
        let (branch, detached) = status_parser::parse_branch_name(&String::from_utf8_lossy(&branch_raw));

        let short_commit = if detached {
            let raw = self
                .git(["rev-parse", "--short", "HEAD"])
                .run(&cancellation)
                .await
                .map_err(|err| err.context("repository head commit query"))?;
            status_parser::parse_short_commit(&String::from_utf8_lossy(&raw))
        } else {
            String::new()
        };

        let (upstream, ahead, behind) = if detached {
            (None, 0, 0)
        } else {
            let upstream_raw = self
                .git(["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
                .run(&cancellation)
                .await
                .ok();
            match upstream_raw {
                Some(raw) => {
                    let upstream = status_parser::parse_upstream(&String::from_utf8_lossy(&raw));
                    let counts = match &upstream {
                        Some(name) => {
                            let raw = self
                                .git([
                                    "rev-list".to_string(),
                                    "--left-right".to_string(),
                                    "--count".to_string(),
                                    format!("{name}...HEAD"),
                                ])
                                .run(&cancellation)
                                .await
                                .map_err(|err| err.context("repository ahead/behind query"))?;
                            status_parser::parse_ahead_behind(&String::from_utf8_lossy(&raw))?
                        }
                        None => (0, 0),
                    };
                    (upstream, counts.0, counts.1)
                }
                None => (None, 0, 0),
            }
        };

        Ok(RepositoryStatus {
            branch,
            detached,
            short_commit,
            upstream,
            ahead,
            behind,
            staged,
            unstaged,
            untracked,
            conflicts,
        })
    }

    /// Stages `paths`. Like every mutator, this invalidates the cache and
    /// publishes a change event before returning, regardless of outcome
    /// short of an error. Every path is validated before it ever reaches the
    /// subprocess argument vector.
    pub async fn stage(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            validate_path(path)?;
        }
        self.run_mutation("stage", paths, |paths| {
            let mut args = vec!["add".to_string(), "--".to_string()];
            args.extend(paths.iter().cloned());
            args
        })
        .await
    }

    pub async fn unstage(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            validate_path(path)?;
        }
        self.run_mutation("unstage", paths, |paths| {
            let mut args = vec!["restore".to_string(), "--staged".to_string(), "--".to_string()];
            args.extend(paths.iter().cloned());
            args
        })
        .await
    }

    pub async fn commit(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(Error::invalid_input("commit message must not be empty"));
        }
        let message = message.to_string();
        self.run_mutation("commit", &[], move |_paths| {
            vec!["commit".to_string(), "-m".to_string(), message.clone()]
        })
        .await
    }

    /// The hook every mutating operation (including the external
    /// collaborators named in the specification — `discard`, `branch`,
    /// `diff`, `blame`, `log` — would use: build the argument vector,
    /// invalidate the cache, and publish a change event naming the affected
    /// paths.
    async fn run_mutation<F>(&self, op: &str, paths: &[String], build: F) -> Result<()>
    where
        F: FnOnce(&[String]) -> Vec<String>,
    {
        let cancellation = CancellationToken::new();
        let command = self.git(build(paths));

        // Cache and mutation entry points share one lock; the write guard
        // is held across the subprocess call so no reader observes a
        // half-applied mutation through a stale cache entry.
        let mut cache = self.cache.write().await;
        command
            .run(&cancellation)
            .await
            .map_err(|err| err.context("repository mutation"))?;
        *cache = None;
        drop(cache);

        debug!(op, paths = ?paths, "repository mutation applied");
        if let Some(bus) = &self.bus {
            bus.publish(
                "repository.changed",
                serde_json::json!({
                    "repository": self.root,
                    "operation": op,
                    "paths": paths,
                }),
            )
            .await;
        }
        Ok(())
    }
}

impl StatusSource for Repository {
    fn refresh_status(&self) -> BoxFuture<'_, Result<RepositoryStatus>> {
        Box::pin(self.refresh_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_is_served_from_cache_within_ttl() {
        let repo = Repository::new(".", RepositoryConfig::new().with_status_cache_ttl(Duration::from_secs(60)));
        // Seed the cache directly so the test does not depend on a real
        // working tree being present.
        {
            let mut cache = repo.cache.write().await;
            *cache = Some(Cached {
                status: RepositoryStatus::default(),
                fetched_at: Instant::now(),
            });
        }
        let status = repo.status().await.unwrap();
        assert_eq!(status, RepositoryStatus::default());
    }

    #[tokio::test]
    async fn commit_rejects_empty_message_without_touching_cache() {
        let repo = Repository::new(".", RepositoryConfig::new());
        {
            let mut cache = repo.cache.write().await;
            *cache = Some(Cached {
                status: RepositoryStatus::default(),
                fetched_at: Instant::now(),
            });
        }
        let err = repo.commit("   ").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
        assert!(repo.cache.read().await.is_some());
    }

    #[tokio::test]
    async fn stage_rejects_a_traversal_path_before_touching_the_cache() {
        let repo = Repository::new(".", RepositoryConfig::new());
        {
            let mut cache = repo.cache.write().await;
            *cache = Some(Cached {
                status: RepositoryStatus::default(),
                fetched_at: Instant::now(),
            });
        }
        let err = repo
            .stage(&["../../etc/passwd".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
        assert!(repo.cache.read().await.is_some());
    }

    #[test]
    fn git_command_carries_the_configured_ssh_key() {
        let config = RepositoryConfig::new()
            .with_ssh_key_path("/home/user/.ssh/id_rsa")
            .unwrap();
        let repo = Repository::new(".", config);
        let command = repo.git(["status"]);
        assert!(format!("{command:?}").contains("core.sshCommand=ssh -i /home/user/.ssh/id_rsa"));
    }
}
