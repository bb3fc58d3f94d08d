//! LLM Client: the single point of entry for all text-generation calls.
//!
//! ARCHITECTURAL RULE: No other module may call a model provider directly.
//! Handlers hold an `Arc<dyn LlmBackend>` and never know which provider answers.
//!
//! Backends: hosted Gemini (`gemini`) and a locally served model behind an
//! OpenAI-compatible chat-completions endpoint (`local`).
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;
use tracing::warn;

pub mod gemini;
pub mod local;
pub mod prompts;

pub use gemini::GeminiClient;
pub use local::LocalModelClient;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 300,
            temperature: 0.6,
        }
    }
}

/// Text produced by a backend, with token accounting when the provider reports it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// A text-generation provider. Implement this to add a backend without touching
/// the pipeline or handler code.
///
/// Carried in `AppState` as `Option<Arc<dyn LlmBackend>>`.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short identifier reported in responses and `/health`.
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<Generation, LlmError>;
}

pub(crate) fn build_http_client() -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Sends a request built by `make_request`, retrying on 429, 5xx and transport
/// errors with exponential backoff (1s, 2s). Returns the first successful
/// response. Other non-success statuses are returned as `LlmError::Api` with
/// the message extracted by `extract_message`.
pub(crate) async fn send_with_retry<F, M>(
    make_request: F,
    extract_message: M,
) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
    M: Fn(&str) -> Option<String>,
{
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                "LLM call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match make_request().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(LlmError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            last_error = Some(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_message(&body).unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        return Ok(response);
    }

    Err(last_error.unwrap_or(LlmError::RateLimited {
        retries: MAX_RETRIES,
    }))
}
