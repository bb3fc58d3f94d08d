//! Live situational context from public data providers.
//!
//! All outbound calls to weather, seismic, natural-event and news providers go
//! through `FeedClient`. Each provider module owns its upstream payload types,
//! a pure parse step (tested against captured payloads) and a `fetch_*` call.

pub mod earthquakes;
pub mod events;
pub mod geocode;
pub mod handlers;
pub mod news;
pub mod weather;

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Centre of India, used when no location is given or geocoding fails.
pub const DEFAULT_LAT: f64 = 20.5937;
pub const DEFAULT_LON: f64 = 78.9629;
/// Approximate bounding box of India: [lon_min, lat_min, lon_max, lat_max].
pub const INDIA_BBOX: [f64; 4] = [68.0, 6.0, 98.0, 38.0];

pub const USER_AGENT: &str = concat!("disaster-api/", env!("CARGO_PKG_VERSION"));
const FEED_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{0} is not configured")]
    MissingApiKey(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("malformed {provider} payload: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

/// Shared HTTP client plus provider credentials.
#[derive(Clone)]
pub struct FeedClient {
    http: Client,
    openweathermap_api_key: Option<String>,
    newsapi_key: Option<String>,
}

impl FeedClient {
    pub fn new(
        openweathermap_api_key: Option<String>,
        newsapi_key: Option<String>,
    ) -> Result<Self, FeedError> {
        Ok(Self {
            http: build_http_client()?,
            openweathermap_api_key,
            newsapi_key,
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}

pub(crate) fn build_http_client() -> Result<Client, FeedError> {
    Ok(Client::builder()
        .timeout(FEED_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Sends `request` and decodes a successful JSON body.
/// Non-success statuses become `FeedError::Upstream` carrying the raw body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, FeedError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(FeedError::Upstream {
            provider,
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json::<T>().await?)
}
