//! Demo host process: wires a [`Manager`], an [`EventBus`], and a
//! [`Repository`]/[`StatusWatcher`] pair together, installs a `tracing`
//! subscriber, and runs until interrupted.
//!
//! This binary exists to exercise the runtime end-to-end; an embedding
//! editor host is expected to own this wiring itself rather than shell out
//! to this process.

use std::env;
use std::sync::Arc;

use integration_core::{
    Manager, ManagerConfig, Repository, RepositoryConfig, StatusSource, StatusWatcher,
    WatcherConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let workspace_root = env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let bus = Arc::new(integration_core::EventBus::new());

    run(workspace_root, bus).await;
}

async fn run(workspace_root: String, bus: Arc<integration_core::EventBus>) {
    bus.subscribe("integration.*", |record| {
        tracing::info!(topic = %record.topic, payload = %record.payload, "lifecycle event");
    })
    .await;
    bus.subscribe("repository.*", |record| {
        tracing::info!(topic = %record.topic, payload = %record.payload, "repository event");
    })
    .await;

    let manager = Manager::new(ManagerConfig::new().with_workspace_root(workspace_root.clone()))
        .with_event_bus(Arc::clone(&bus));
    manager.start().await;

    let repository = Arc::new(
        Repository::new(workspace_root, RepositoryConfig::new()).with_event_bus(Arc::clone(&bus)),
    );
    let source: Arc<dyn StatusSource> = repository;
    let watcher = Arc::new(StatusWatcher::new(source, WatcherConfig::new()));
    watcher
        .on_change(|status| {
            tracing::info!(branch = %status.branch, staged = status.staged.len(), unstaged = status.unstaged.len(), "status changed");
        })
        .await;
    watcher.start().await;

    tracing::info!("integration-host running, press ctrl-c to stop");
    let _ = tokio::signal::ctrl_c().await;

    tracing::info!("shutting down");
    watcher.stop().await;
    if let Err(err) = manager.close().await {
        tracing::error!(error = %err, "manager close failed");
    }
}
