use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `X-API-Key` header does not match the configured secret.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let rejection = match request.headers().get(API_KEY_HEADER) {
        None => Some("API Key required"),
        Some(key) if keys_match(key.as_bytes(), state.config.api_secret_key.as_bytes()) => None,
        Some(_) => Some("Invalid API Key"),
    };

    match rejection {
        None => Ok(next.run(request).await),
        Some(reason) => {
            warn!("{reason} on {}", request.uri().path());
            Err(AppError::Unauthorized(reason.to_string()))
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(given: &[u8], expected: &[u8]) -> bool {
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match(b"s3cret-key", b"s3cret-key"));
        assert!(!keys_match(b"s3cret-kez", b"s3cret-key"));
        assert!(!keys_match(b"s3cret", b"s3cret-key"));
        assert!(!keys_match(b"", b"s3cret-key"));
    }
}
