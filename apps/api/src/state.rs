use std::sync::Arc;

use crate::config::Config;
use crate::feeds::geocode::Geocoder;
use crate::feeds::FeedClient;
use crate::knowledge::ContextStore;
use crate::llm_client::LlmBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// JSONL context records, loaded at startup and reloadable at runtime.
    pub store: Arc<ContextStore>,
    pub feeds: FeedClient,
    pub geocoder: Arc<Geocoder>,
    /// `None` when the configured backend could not be set up (e.g. no API key);
    /// `/process` then answers 503.
    pub llm: Option<Arc<dyn LlmBackend>>,
}

impl AppState {
    pub fn llm_backend_name(&self) -> &'static str {
        self.llm.as_ref().map_or("unconfigured", |llm| llm.name())
    }
}
