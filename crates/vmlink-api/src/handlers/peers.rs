//! /peers handlers: entry listing, inspection, removal and IP learning.

use std::net::Ipv4Addr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use vmlink_registry::{EntrySnapshot, RegistryError};

use super::{parse_mac, ApiState};

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PeersResponse {
    pub peers: Vec<EntrySnapshot>,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    Json(PeersResponse {
        peers: state.registry.snapshot(),
    })
}

// ── /peers/{mac} (GET) ────────────────────────────────────────────────────────

pub async fn handle_peer_inspect(
    State(state): State<ApiState>,
    Path(mac): Path<String>,
) -> Result<Json<EntrySnapshot>, (StatusCode, String)> {
    let mac = parse_mac(&mac)?;
    let entry = state
        .registry
        .lookup(&mac)
        .ok_or((StatusCode::NOT_FOUND, "peer not found".to_string()))?;
    Ok(Json(entry.snapshot(state.registry.now_ms())))
}

// ── /peers/{mac} (DELETE) ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PeerRemoveResponse {
    pub mac: String,
    pub removed: bool,
}

pub async fn handle_peer_remove(
    State(state): State<ApiState>,
    Path(mac_text): Path<String>,
) -> Result<Json<PeerRemoveResponse>, (StatusCode, String)> {
    let mac = parse_mac(&mac_text)?;
    let removed = state
        .registry
        .remove_and_notify(&mac, state.notifier.as_ref());

    if removed {
        tracing::info!(mac = %mac, "peer removed via API");
    }

    Ok(Json(PeerRemoveResponse {
        mac: mac.to_string(),
        removed,
    }))
}

// ── /peers/{mac}/ip (POST) ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PeerIpRequest {
    pub ip: Ipv4Addr,
}

pub async fn handle_peer_ip(
    State(state): State<ApiState>,
    Path(mac): Path<String>,
    Json(req): Json<PeerIpRequest>,
) -> Result<Json<EntrySnapshot>, (StatusCode, String)> {
    let mac = parse_mac(&mac)?;
    let entry = state
        .registry
        .lookup(&mac)
        .ok_or((StatusCode::NOT_FOUND, "peer not found".to_string()))?;

    state.registry.insert_ip(req.ip, &entry).map_err(|e| {
        let code = match e {
            RegistryError::UnspecifiedIp => StatusCode::BAD_REQUEST,
            RegistryError::StaleHandle => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        };
        (code, e.to_string())
    })?;

    Ok(Json(entry.snapshot(state.registry.now_ms())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{mac, state};

    #[tokio::test]
    async fn inspect_known_and_unknown() {
        let (state, _, _) = state();
        state.registry.insert(mac(1), 4).unwrap();

        let Json(snap) = handle_peer_inspect(State(state.clone()), Path(mac(1).to_string()))
            .await
            .unwrap();
        assert_eq!(snap.peer_id, 4);

        let err = handle_peer_inspect(State(state.clone()), Path(mac(2).to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = handle_peer_inspect(State(state), Path("nonsense".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn remove_notifies_peer() {
        let (state, _, notifier) = state();
        state.registry.insert(mac(1), 1).unwrap();

        let Json(resp) = handle_peer_remove(State(state.clone()), Path(mac(1).to_string()))
            .await
            .unwrap();
        assert!(resp.removed);

        let Json(resp) = handle_peer_remove(State(state), Path(mac(1).to_string()))
            .await
            .unwrap();
        assert!(!resp.removed);
        assert_eq!(notifier.sent(), vec![mac(1)]);
    }

    #[tokio::test]
    async fn ip_learning_and_conflict() {
        let (state, _, _) = state();
        state.registry.insert(mac(1), 1).unwrap();
        state.registry.insert(mac(2), 2).unwrap();
        let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();

        let Json(snap) = handle_peer_ip(
            State(state.clone()),
            Path(mac(1).to_string()),
            Json(PeerIpRequest { ip }),
        )
        .await
        .unwrap();
        assert_eq!(snap.ip, Some(ip));

        let err = handle_peer_ip(
            State(state.clone()),
            Path(mac(2).to_string()),
            Json(PeerIpRequest { ip }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);

        let err = handle_peer_ip(
            State(state),
            Path(mac(3).to_string()),
            Json(PeerIpRequest { ip }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
