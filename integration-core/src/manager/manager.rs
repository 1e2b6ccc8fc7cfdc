//! Owns feature subsystems, aggregates their health, and coordinates
//! graceful shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::ManagerConfig;
use crate::coordination::CancellationToken;
use crate::error::Result;
use crate::events::EventBus;
use crate::manager::supervisor::Supervisor;

/// Coarse health level a component can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A capability mirroring [`crate::events::EventPublisher`]: lets a feature
/// subsystem report its health without the Manager depending on its
/// concrete type.
pub trait HealthSource: Send + Sync {
    fn health(&self) -> HealthStatus;
}

#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub uptime: Duration,
    pub active_child_processes: usize,
    pub components: Vec<(String, HealthStatus)>,
}

/// Top-level runtime object: constructs and owns feature subsystems,
/// exposes workspace-root and event-bus configuration, and drives a
/// bounded, idempotent shutdown.
pub struct Manager {
    config: ManagerConfig,
    started_at: Instant,
    workspace_root: RwLock<String>,
    event_bus: RwLock<Option<Arc<EventBus>>>,
    supervisor: Arc<Supervisor>,
    components: Mutex<HashMap<String, Arc<dyn HealthSource>>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        let grace_period = config.shutdown_timeout();
        let workspace_root = config.workspace_root.clone();
        let max_supervised_processes = config.max_supervised_processes;
        Self {
            config,
            started_at: Instant::now(),
            workspace_root: RwLock::new(workspace_root),
            event_bus: RwLock::new(None),
            supervisor: Arc::new(Supervisor::new(grace_period, max_supervised_processes)),
            components: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = RwLock::new(Some(bus));
        self
    }

    pub async fn workspace_root(&self) -> String {
        self.workspace_root.read().await.clone()
    }

    pub async fn set_workspace_root(&self, root: impl Into<String>) {
        let root = root.into();
        *self.workspace_root.write().await = root.clone();
        if let Some(bus) = self.event_bus().await {
            bus.publish("integration.workspace.changed", serde_json::json!({ "root": root }))
                .await;
        }
    }

    /// Publishes `integration.started`. Not required before using the
    /// Manager — it only announces readiness to subscribers.
    pub async fn start(&self) {
        if let Some(bus) = self.event_bus().await {
            bus.publish("integration.started", serde_json::json!({})).await;
        }
    }

    pub async fn event_bus(&self) -> Option<Arc<EventBus>> {
        self.event_bus.read().await.clone()
    }

    pub async fn set_event_bus(&self, bus: Arc<EventBus>) {
        *self.event_bus.write().await = Some(bus);
    }

    pub fn supervisor(&self) -> Arc<Supervisor> {
        Arc::clone(&self.supervisor)
    }

    /// A cancellation context that fires the moment `close()` is called,
    /// before subsystems have actually finished shutting down.
    pub fn shutdown_context(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Registers a feature subsystem's health capability under `name`.
    pub async fn register_component(&self, name: impl Into<String>, source: Arc<dyn HealthSource>) {
        self.components.lock().await.insert(name.into(), source);
    }

    pub async fn health(&self) -> HealthSnapshot {
        let components = self.components.lock().await;
        let mut reported = Vec::with_capacity(components.len());
        let mut worst = HealthStatus::Healthy;
        for (name, source) in components.iter() {
            let status = source.health();
            if status > worst {
                worst = status;
            }
            reported.push((name.clone(), status));
        }
        HealthSnapshot {
            status: worst,
            uptime: self.started_at.elapsed(),
            active_child_processes: self.supervisor.count().await,
            components: reported,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Blocks (asynchronously) until `close()` has run to completion.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.cancelled().await;
    }

    /// Idempotent graceful shutdown: publish `integration.stopping`, cancel
    /// the shutdown context so cancellation-aware operations unwind,
    /// terminate all supervised children within the configured timeout,
    /// publish `integration.stopped`, then mark closed. Subsequent calls
    /// are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!("manager: shutting down");
        if let Some(bus) = self.event_bus().await {
            bus.publish("integration.stopping", serde_json::json!({})).await;
        }

        self.shutdown.cancel();

        let shutdown_timeout = self.config.shutdown_timeout();
        match tokio::time::timeout(shutdown_timeout, self.supervisor.stop_all()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("manager: shutdown timeout elapsed before all children stopped");
            }
        }

        if let Some(bus) = self.event_bus().await {
            bus.publish("integration.stopped", serde_json::json!({})).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHealth(HealthStatus);
    impl HealthSource for FixedHealth {
        fn health(&self) -> HealthStatus {
            self.0
        }
    }

    #[tokio::test]
    async fn health_is_the_worst_of_its_components() {
        let manager = Manager::new(ManagerConfig::new());
        manager
            .register_component("a", Arc::new(FixedHealth(HealthStatus::Healthy)))
            .await;
        manager
            .register_component("b", Arc::new(FixedHealth(HealthStatus::Degraded)))
            .await;

        let snapshot = manager.health().await;
        assert_eq!(snapshot.status, HealthStatus::Degraded);
        assert_eq!(snapshot.components.len(), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_cancels_shutdown_context() {
        let manager = Manager::new(ManagerConfig::new());
        let shutdown = manager.shutdown_context();
        assert!(!shutdown.is_cancelled());

        manager.close().await.unwrap();
        manager.close().await.unwrap();

        assert!(shutdown.is_cancelled());
        assert!(manager.is_closed());
    }

    #[tokio::test]
    async fn workspace_root_defaults_to_config_and_is_mutable() {
        let manager = Manager::new(ManagerConfig::new().with_workspace_root("/repo"));
        assert_eq!(manager.workspace_root().await, "/repo");
        manager.set_workspace_root("/other").await;
        assert_eq!(manager.workspace_root().await, "/other");
    }
}
