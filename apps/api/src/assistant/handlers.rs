//! Axum route handler for the assistant endpoint.

use axum::{extract::State, Json};

use crate::assistant::pipeline::{process_query, ProcessRequest, ProcessResponse};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /process
///
/// Gathers live and reference context for the query, builds a prompt and
/// returns the LLM's answer together with the context that was used.
pub async fn handle_process(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    Ok(Json(process_query(&state, request).await?))
}
