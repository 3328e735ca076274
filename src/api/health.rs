use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    store_connected: bool,
    protocols: usize,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_connected = state.store.ping().await.is_ok();

    Json(HealthResponse {
        status: if store_connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        store_connected,
        protocols: state.registry.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
