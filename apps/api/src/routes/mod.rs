pub mod auth;
pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::assistant::handlers as assistant;
use crate::feeds::handlers as feeds;
use crate::knowledge::handlers as knowledge;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        // Assistant
        .route("/process", post(assistant::handle_process))
        // Live context feeds
        .route("/context/weather", post(feeds::handle_weather))
        .route("/context/earthquakes", post(feeds::handle_earthquakes))
        .route("/context/natural_events", post(feeds::handle_natural_events))
        .route("/context/news", post(feeds::handle_news))
        // Context store
        .route("/context/knowledge", post(knowledge::handle_search))
        .route("/context/knowledge/stats", get(knowledge::handle_stats))
        .route("/context/knowledge/reload", post(knowledge::handle_reload))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .merge(protected)
        .with_state(state)
}
