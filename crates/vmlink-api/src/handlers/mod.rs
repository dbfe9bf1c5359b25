//! HTTP API handlers. Expose registry state as JSON.

pub mod discovery;
pub mod peers;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use vmlink_core::MacAddr;
use vmlink_registry::{PeerNotifier, Registry};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
    /// Tells remote VMs to tear down their side on explicit removal.
    pub notifier: Arc<dyn PeerNotifier>,
    /// Interface the fast path is attached to (reported by /status).
    pub interface: String,
    /// Upper bound on how long POST /freeze waits.
    pub freeze_timeout: Duration,
    /// Broadcast sender for graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn parse_mac(text: &str) -> Result<MacAddr, (StatusCode, String)> {
    text.parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid mac: {e}")))
}

// Re-export handler functions for use in router setup.
pub use discovery::{handle_discovery, handle_freeze};
pub use peers::{handle_peer_inspect, handle_peer_ip, handle_peer_remove, handle_peers};
pub use status::{handle_shutdown, handle_status};
