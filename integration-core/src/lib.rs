//! # Integration Core
//!
//! Editor-host integration runtime: a lifecycle manager, a topic-based
//! event bus, a version-control status engine, and the concurrency
//! primitives that hold it all together.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Editor Host                            │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                  │ owns
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           Manager                               │
//! │  ┌───────────────┐   ┌───────────────┐   ┌──────────────────┐ │
//! │  │  Supervisor    │   │   EventBus     │   │  HealthSource    │ │
//! │  │ (child procs)  │   │ (pub/sub)      │   │  (per component) │ │
//! │  └───────┬────────┘   └───────┬───────┘   └──────────────────┘ │
//! └──────────┼─────────────────────┼─────────────────────────────┘
//!            │                     │
//!            ▼                     ▼
//! ┌───────────────────┐   ┌─────────────────────────────────────┐
//! │  feature processes │   │            Repository               │
//! │  (terminal, debug…) │   │  status cache ─ stage/unstage/commit│
//! └────────────────────┘   │            │                        │
//!                           ▼            ▼
//!                     StatusWatcher   git (via process::ExecCommand)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use integration_core::config::ManagerConfig;
//! use integration_core::events::EventBus;
//! use integration_core::manager::Manager;
//! use integration_core::vcs::{Repository, RepositoryConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> integration_core::error::Result<()> {
//! let bus = Arc::new(EventBus::new());
//! let manager = Manager::new(ManagerConfig::new().with_workspace_root("/path/to/repo"))
//!     .with_event_bus(Arc::clone(&bus));
//! manager.start().await;
//!
//! let repo = Repository::new("/path/to/repo", RepositoryConfig::new())
//!     .with_event_bus(Arc::clone(&bus));
//! let status = repo.status().await?;
//! println!("on branch {}", status.branch);
//!
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`error`] — crate-wide [`error::Error`] / [`error::ErrorKind`] taxonomy
//! - [`config`] — typed, builder-style configuration for every component
//! - [`coordination`] — debounce, throttle, TTL cache, cancellation, retry,
//!   circuit breaker, timeout, and panic-safe task spawning
//! - [`events`] — the topic-based [`events::EventBus`]
//! - [`process`] — argument-vector subprocess execution
//! - [`vcs`] — porcelain status parsing, the [`vcs::Repository`] facade, and
//!   [`vcs::StatusWatcher`]
//! - [`manager`] — the top-level [`manager::Manager`] and its
//!   [`manager::Supervisor`]
//! - [`validation`] — shell-adjacent string and path validators

pub mod config;
pub mod coordination;
pub mod error;
pub mod events;
pub mod manager;
pub mod process;
pub mod validation;
pub mod vcs;

pub use config::{ManagerConfig, RepositoryConfig, WatcherConfig};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventBus, EventPublisher, EventRecord, SubscriptionId};
pub use manager::{HealthSnapshot, HealthSource, HealthStatus, Manager, Supervisor};
pub use vcs::{ChangeKind, FileChange, Repository, RepositoryStatus, StatusSource, StatusWatcher};
