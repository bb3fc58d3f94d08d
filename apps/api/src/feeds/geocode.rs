//! Place-name geocoding via OpenStreetMap Nominatim.
//!
//! Nominatim's usage policy allows at most one request per second and requires
//! an identifying User-Agent. Lookups are serialized behind a mutex that
//! remembers when the last upstream request went out; successful results are
//! cached for the life of the process.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::feeds::{build_http_client, get_json, FeedError};

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
}

pub struct Geocoder {
    http: Client,
    last_request: Mutex<Option<Instant>>,
    cache: RwLock<HashMap<String, Coordinates>>,
}

impl Geocoder {
    pub fn new() -> Result<Self, FeedError> {
        Ok(Self {
            http: build_http_client()?,
            last_request: Mutex::new(None),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub async fn lookup(&self, place: &str) -> Result<Coordinates, FeedError> {
        let key = cache_key(place);
        if key.is_empty() {
            return Err(FeedError::NotFound("empty place name".to_string()));
        }

        if let Some(coords) = self.cache.read().await.get(&key) {
            debug!("Geocode cache hit for '{key}'");
            return Ok(*coords);
        }

        let places: Vec<NominatimPlace> = {
            let mut last = self.last_request.lock().await;
            let wait = wait_needed(*last, Instant::now());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            let request = self
                .http
                .get(NOMINATIM_URL)
                .query(&[("q", place.trim()), ("format", "json"), ("limit", "1")]);
            let result = get_json("nominatim", request).await;
            *last = Some(Instant::now());
            result?
        };

        let coords = first_coordinates(places)?
            .ok_or_else(|| FeedError::NotFound(format!("Could not geocode '{}'", place.trim())))?;

        info!(
            "Geocoded '{}' to ({:.4}, {:.4})",
            place.trim(),
            coords.latitude,
            coords.longitude
        );
        self.cache.write().await.insert(key, coords);
        Ok(coords)
    }
}

fn cache_key(place: &str) -> String {
    place.trim().to_lowercase()
}

/// How long to wait before the next upstream request may be sent.
fn wait_needed(last: Option<Instant>, now: Instant) -> Duration {
    match last {
        Some(prev) => MIN_INTERVAL.saturating_sub(now.saturating_duration_since(prev)),
        None => Duration::ZERO,
    }
}

/// Nominatim returns coordinates as strings.
pub fn first_coordinates(places: Vec<NominatimPlace>) -> Result<Option<Coordinates>, FeedError> {
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    let parse = |v: &str| {
        v.parse::<f64>().map_err(|e| FeedError::Malformed {
            provider: "nominatim",
            message: format!("bad coordinate '{v}': {e}"),
        })
    };
    Ok(Some(Coordinates {
        latitude: parse(&place.lat)?,
        longitude: parse(&place.lon)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_string_coordinates() {
        let places: Vec<NominatimPlace> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "19.0759899", "lon": "72.8773928", "display_name": "Mumbai, Maharashtra, India"}]"#,
        )
        .unwrap();
        let coords = first_coordinates(places).unwrap().unwrap();
        assert!((coords.latitude - 19.0759899).abs() < 1e-9);
        assert!((coords.longitude - 72.8773928).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_is_none() {
        assert!(first_coordinates(vec![]).unwrap().is_none());
    }

    #[test]
    fn test_bad_coordinate_is_malformed() {
        let places = vec![NominatimPlace {
            lat: "north".to_string(),
            lon: "1.0".to_string(),
        }];
        assert!(matches!(
            first_coordinates(places),
            Err(FeedError::Malformed { .. })
        ));
    }

    #[test]
    fn test_cache_key_normalizes_case_and_whitespace() {
        assert_eq!(cache_key("  Kolkata "), cache_key("kolkata"));
    }

    #[test]
    fn test_wait_needed() {
        let now = Instant::now();
        assert_eq!(wait_needed(None, now), Duration::ZERO);
        assert_eq!(wait_needed(Some(now), now), MIN_INTERVAL);
        let later = now + Duration::from_millis(1500);
        assert_eq!(wait_needed(Some(now), later), Duration::ZERO);
        let soon = now + Duration::from_millis(400);
        assert_eq!(wait_needed(Some(now), soon), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_cached_lookup_skips_network() {
        let geocoder = Geocoder::new().unwrap();
        let delhi = Coordinates {
            latitude: 28.61,
            longitude: 77.23,
        };
        geocoder.cache.write().await.insert("delhi".to_string(), delhi);
        assert_eq!(geocoder.lookup(" Delhi ").await.unwrap(), delhi);
    }

    #[tokio::test]
    async fn test_blank_place_is_not_found() {
        let geocoder = Geocoder::new().unwrap();
        assert!(matches!(
            geocoder.lookup("   ").await,
            Err(FeedError::NotFound(_))
        ));
    }
}
