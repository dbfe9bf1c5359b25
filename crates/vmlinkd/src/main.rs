//! vmlinkd — inter-VM fast-path connection daemon.

use std::sync::Arc;

use anyhow::Result;

use vmlink_core::VmlinkConfig;
use vmlink_registry::{sweep_loop, PeerNotifier, Registry};

mod migration;
mod notifier;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = VmlinkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = VmlinkConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        VmlinkConfig::default()
    });
    if let Some(interface) = std::env::args().nth(1) {
        config.network.interface = interface;
    }

    tracing::info!(
        interface = %config.network.interface,
        buckets = config.registry.buckets,
        max_entries = config.registry.max_entries,
        staleness_ms = config.discovery.staleness_threshold().as_millis() as u64,
        "vmlinkd starting"
    );

    // Shared state
    let registry = Arc::new(Registry::from_config(&config));
    let notifier: Arc<dyn PeerNotifier> = Arc::new(notifier::LogNotifier::new());

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let sweep_task = tokio::spawn(sweep_loop(
        registry.clone(),
        config.maintenance.sweep_interval(),
        shutdown_tx.subscribe(),
    ));

    let migration_task = tokio::spawn(migration::migration_loop(
        registry.clone(),
        config.maintenance.freeze_timeout(),
        shutdown_tx.subscribe(),
    ));

    let api_task = {
        let state = vmlink_api::ApiState {
            registry: registry.clone(),
            notifier,
            interface: config.network.interface.clone(),
            freeze_timeout: config.maintenance.freeze_timeout(),
            shutdown_tx: shutdown_tx.clone(),
        };
        let port = config.network.api_port;
        tokio::spawn(async move {
            if let Err(e) = vmlink_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = sweep_task          => tracing::error!("sweep task exited: {:?}", r),
        r = migration_task      => tracing::error!("migration task exited: {:?}", r),
        r = api_task            => tracing::error!("API server exited: {:?}", r),
    }

    let drained = registry.drain_all();
    tracing::info!(drained, "registry drained");

    Ok(())
}
