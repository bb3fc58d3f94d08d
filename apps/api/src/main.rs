mod assistant;
mod config;
mod errors;
mod feeds;
mod knowledge;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, LlmBackendKind};
use crate::feeds::geocode::Geocoder;
use crate::feeds::FeedClient;
use crate::knowledge::ContextStore;
use crate::llm_client::{GeminiClient, LlmBackend, LocalModelClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Disaster Assistant API v{}", env!("CARGO_PKG_VERSION"));

    // Load JSONL context records
    let store = ContextStore::load(&config.data_dir)?;
    let stats = store.stats().await;
    info!(
        "Context store loaded from {} ({} records in {} files, {} lines skipped)",
        config.data_dir.display(),
        stats.total_records,
        stats.files.len(),
        stats.skipped_lines
    );

    // Initialize provider clients
    let feeds = FeedClient::new(
        config.openweathermap_api_key.clone(),
        config.newsapi_key.clone(),
    )?;
    let geocoder = Geocoder::new()?;
    if config.enable_live_context {
        if config.openweathermap_api_key.is_none() {
            warn!("OPENWEATHERMAP_API_KEY not set; weather context disabled");
        }
        if config.newsapi_key.is_none() {
            warn!("NEWSAPI_KEY not set; news context disabled");
        }
    } else {
        info!("Live context disabled (ENABLE_LIVE_CONTEXT=false)");
    }

    // Initialize LLM backend
    let llm = build_llm_backend(&config)?;
    match &llm {
        Some(backend) => info!("LLM backend initialized: {}", backend.name()),
        None => warn!("No LLM backend available; /process will answer 503"),
    }

    // Build app state
    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(store),
        feeds,
        geocoder: Arc::new(geocoder),
        llm,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs the configured LLM backend. A missing Gemini key is not fatal:
/// the server still serves the context endpoints.
fn build_llm_backend(config: &Config) -> Result<Option<Arc<dyn LlmBackend>>> {
    let backend: Arc<dyn LlmBackend> = match config.llm_backend {
        LlmBackendKind::Gemini => {
            let Some(api_key) = config.google_api_key.clone() else {
                warn!("GOOGLE_API_KEY not set; Gemini backend unavailable");
                return Ok(None);
            };
            Arc::new(GeminiClient::new(api_key)?)
        }
        LlmBackendKind::Local => Arc::new(LocalModelClient::new(
            config.local_llm_url.clone(),
            config.local_llm_model.clone(),
            config.local_llm_api_key.clone(),
        )?),
    };
    Ok(Some(backend))
}
