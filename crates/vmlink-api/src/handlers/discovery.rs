//! /discovery and /freeze handlers.
//!
//! The discovery agent posts the set of peers it saw this round. Unknown
//! addresses are registered; the full set then drives `update`, which
//! refreshes reported peers and suspends the rest.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use vmlink_core::MacAddr;
use vmlink_registry::{PeerId, RegistryError};

use super::ApiState;

// ── /discovery ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DiscoveredPeer {
    pub mac: MacAddr,
    pub peer_id: PeerId,
}

#[derive(Debug, Deserialize)]
pub struct DiscoveryRequest {
    pub peers: Vec<DiscoveredPeer>,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub inserted: usize,
    pub dropped: usize,
    pub refreshed: usize,
    pub suspended: usize,
}

pub async fn handle_discovery(
    State(state): State<ApiState>,
    Json(req): Json<DiscoveryRequest>,
) -> Json<DiscoveryResponse> {
    let registry = &state.registry;
    let mut inserted = 0;
    let mut dropped = 0;

    for peer in &req.peers {
        match registry.insert(peer.mac, peer.peer_id) {
            Ok(_) => {
                inserted += 1;
                tracing::info!(mac = %peer.mac, peer_id = peer.peer_id, "new peer discovered");
            }
            Err(RegistryError::DuplicateMac(_)) => {}
            Err(e) => {
                // Dropped for this round; the next round retries.
                dropped += 1;
                tracing::warn!(mac = %peer.mac, error = %e, "discovered peer not registered");
            }
        }
    }

    let seen: Vec<MacAddr> = req.peers.iter().map(|p| p.mac).collect();
    let outcome = registry.update(&seen);

    Json(DiscoveryResponse {
        inserted,
        dropped,
        refreshed: outcome.refreshed,
        suspended: outcome.suspended,
    })
}

// ── /freeze ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FreezeResponse {
    pub cleared: bool,
    pub remaining: usize,
}

pub async fn handle_freeze(State(state): State<ApiState>) -> Json<FreezeResponse> {
    tracing::info!("freeze requested via API");
    let cleared = vmlink_registry::freeze(&state.registry, state.freeze_timeout).await;
    Json(FreezeResponse {
        cleared,
        remaining: state.registry.mac_count(),
    })
}
