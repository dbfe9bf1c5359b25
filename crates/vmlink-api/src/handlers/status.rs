//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub interface: String,
    pub entries: usize,
    pub ip_entries: usize,
    pub suspended: usize,
    pub with_channel: usize,
    pub buckets: usize,
    pub capacity: usize,
    pub staleness_ms: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let registry = &state.registry;
    let snapshot = registry.snapshot();

    Json(StatusResponse {
        interface: state.interface.clone(),
        entries: registry.mac_count(),
        ip_entries: registry.ip_count(),
        suspended: snapshot
            .iter()
            .filter(|s| s.status == vmlink_registry::EntryStatus::Suspend)
            .count(),
        with_channel: snapshot.iter().filter(|s| s.has_channel).count(),
        buckets: registry.bucket_count(),
        capacity: registry.capacity(),
        staleness_ms: registry.staleness().as_millis() as u64,
    })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub shutting_down: bool,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let shutting_down = state.shutdown_tx.send(()).is_ok();
    Json(ShutdownResponse { shutting_down })
}
