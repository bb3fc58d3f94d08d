use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::knowledge::search::{KnowledgeMatch, DEFAULT_LIMIT};
use crate::knowledge::StoreStats;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KnowledgeQuery {
    pub query: String,
    pub location: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct KnowledgeSearchResponse {
    pub count: usize,
    pub matches: Vec<KnowledgeMatch>,
}

/// POST /context/knowledge
///
/// `limit` is clamped to `1..=MAX_LIMIT` by the store.
pub async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<KnowledgeQuery>,
) -> Result<Json<KnowledgeSearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }
    let matches = state
        .store
        .search(&req.query, req.location.as_deref(), req.limit)
        .await;
    Ok(Json(KnowledgeSearchResponse {
        count: matches.len(),
        matches,
    }))
}

/// GET /context/knowledge/stats
pub async fn handle_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats().await)
}

/// POST /context/knowledge/reload
pub async fn handle_reload(State(state): State<AppState>) -> Result<Json<StoreStats>, AppError> {
    Ok(Json(state.store.reload().await?))
}
