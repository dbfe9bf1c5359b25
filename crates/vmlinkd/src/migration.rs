//! Migration trigger: SIGUSR1 freezes the table.
//!
//! The migration tool signals the daemon before it pauses the VM; the freeze
//! marks every entry suspended and waits for the sweep loop to reap them.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;

use vmlink_registry::Registry;

pub async fn migration_loop(
    registry: Arc<Registry>,
    timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let mut usr1 = signal(SignalKind::user_defined1())?;

    loop {
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            received = usr1.recv() => {
                if received.is_none() {
                    anyhow::bail!("SIGUSR1 stream closed");
                }
                run_freeze(&registry, timeout).await;
            }
        }
    }
}

/// One freeze cycle, logged. Returns whether the table cleared.
pub async fn run_freeze(registry: &Registry, timeout: Duration) -> bool {
    let before = registry.mac_count();
    tracing::info!(entries = before, "migration freeze starting");
    let cleared = vmlink_registry::freeze(registry, timeout).await;
    tracing::info!(
        cleared,
        before,
        remaining = registry.mac_count(),
        "migration freeze finished"
    );
    cleared
}
