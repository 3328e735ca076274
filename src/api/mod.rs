mod destroy;
mod health;

pub use destroy::{normalize_ids, parse_request, run_data_destruction, DestructionRequest};
pub use health::health_check;

use crate::registry::ProtocolRegistry;
use crate::store::ConnectIdStore;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Large enough for a few hundred thousand Connect_IDs in one request.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared, read-only request state.
pub struct AppState {
    pub registry: Arc<ProtocolRegistry>,
    pub store: Arc<dyn ConnectIdStore>,
    pub started_at: Instant,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(registry: ProtocolRegistry, store: Arc<dyn ConnectIdStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            started_at: Instant::now(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/", post(run_data_destruction))
        .route("/run_bq_data_destruction", post(run_data_destruction))
        .route("/health", get(health_check))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
