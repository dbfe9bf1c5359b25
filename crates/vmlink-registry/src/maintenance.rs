//! Background maintenance: the periodic sweep and the migration freeze.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::registry::Registry;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stale: usize,
    pub reaped: usize,
    pub nudged: usize,
}

/// Timeout check, reap, then liveness nudges.
pub fn sweep_once(registry: &Registry) -> SweepReport {
    let stale = registry.check_timeout();
    let reaped = registry.reap_suspended();
    let nudged = registry.notify_all_channels();
    SweepReport {
        stale,
        reaped,
        nudged,
    }
}

/// Run [`sweep_once`] every `interval` until shutdown is broadcast.
pub async fn sweep_loop(
    registry: Arc<Registry>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_ms = interval.as_millis() as u64, "sweep loop starting");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("sweep loop stopping");
                return;
            }
            _ = ticker.tick() => {
                let report = sweep_once(&registry);
                if report.stale > 0 || report.reaped > 0 {
                    tracing::debug!(
                        stale = report.stale,
                        reaped = report.reaped,
                        remaining = registry.mac_count(),
                        "sweep"
                    );
                }
            }
        }
    }
}

/// Freeze the table ahead of migration.
///
/// Marks every entry suspended, then waits until no suspended entry is
/// left (the sweep loop reaps them) or `timeout` elapses. Returns whether
/// the table cleared in time.
pub async fn freeze(registry: &Registry, timeout: Duration) -> bool {
    // Subscribe before marking so a reap that finishes immediately is seen.
    let mut rx = registry.subscribe();
    let marked = registry.mark_suspend_all();

    let wait = async {
        while registry.has_suspended_entry() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    let cleared = tokio::time::timeout(timeout, wait).await.is_ok() && !registry.has_suspended_entry();
    if cleared {
        tracing::info!(marked, "freeze complete");
    } else {
        tracing::warn!(
            marked,
            timeout_ms = timeout.as_millis() as u64,
            "freeze timed out with suspended entries left"
        );
    }
    cleared
}
