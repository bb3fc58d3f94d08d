use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Disaster Management Assistant API is running."
    }))
}

/// GET /health
/// Returns service status, version, LLM backend and loaded record count.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "llm_backend": state.llm_backend_name(),
        "knowledge_records": state.store.len().await,
    }))
}
