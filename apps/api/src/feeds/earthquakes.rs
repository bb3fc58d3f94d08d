//! Recent earthquakes near a point, from the USGS FDSN event service.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::feeds::{get_json, FeedClient, FeedError, DEFAULT_LAT, DEFAULT_LON};

const USGS_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

#[derive(Debug, Clone, Deserialize)]
pub struct EarthquakeQuery {
    #[serde(default = "default_lat")]
    pub latitude: f64,
    #[serde(default = "default_lon")]
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: u32,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,
}

fn default_lat() -> f64 {
    DEFAULT_LAT
}
fn default_lon() -> f64 {
    DEFAULT_LON
}
fn default_radius_km() -> u32 {
    1000
}
fn default_days() -> u32 {
    7
}
fn default_min_magnitude() -> f64 {
    4.0
}

impl EarthquakeQuery {
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err("latitude must be between -90 and 90".to_string());
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err("longitude must be between -180 and 180".to_string());
        }
        if self.radius_km == 0 {
            return Err("radius_km must be greater than 0".to_string());
        }
        if !(1..=90).contains(&self.days) {
            return Err("days must be between 1 and 90".to_string());
        }
        if self.min_magnitude < 0.0 {
            return Err("min_magnitude must be >= 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earthquake {
    pub id: Option<String>,
    pub magnitude: Option<f64>,
    pub place: Option<String>,
    pub time_utc: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: Option<f64>,
    pub tsunami_warning: bool,
    pub details_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthquakeList {
    pub count: usize,
    pub earthquakes: Vec<Earthquake>,
}

/// Whole magnitudes keep one decimal (`4.0`, not `4`); others print as reported.
fn fmt_magnitude(m: f64) -> String {
    if m.fract() == 0.0 {
        format!("{m:.1}")
    } else {
        m.to_string()
    }
}

impl EarthquakeList {
    /// `Mag 4.6 near 10 km SW of Imphal, India (2024-05-26T13:05Z)` for the first `n`
    /// quakes, joined by `; `. `None` when the list is empty.
    pub fn summary(&self, n: usize) -> Option<String> {
        if self.earthquakes.is_empty() {
            return None;
        }
        Some(
            self.earthquakes
                .iter()
                .take(n)
                .map(|q| {
                    format!(
                        "Mag {} near {} ({})",
                        q.magnitude
                            .map(fmt_magnitude)
                            .unwrap_or_else(|| "?".to_string()),
                        q.place.as_deref().unwrap_or("unknown location"),
                        q.time_utc
                            .map(|t| format!("{}Z", t.format("%Y-%m-%dT%H:%M")))
                            .unwrap_or_else(|| "time unknown".to_string())
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct UsgsCollection {
    #[serde(default)]
    pub features: Vec<UsgsFeature>,
}

#[derive(Debug, Deserialize)]
pub struct UsgsFeature {
    pub id: Option<String>,
    pub properties: Option<UsgsProperties>,
    pub geometry: Option<UsgsGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct UsgsProperties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub time: Option<i64>,
    pub tsunami: Option<i64>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsgsGeometry {
    /// [longitude, latitude, depth_km]
    #[serde(default)]
    pub coordinates: Vec<Option<f64>>,
}

/// Features without a longitude/latitude pair are dropped.
pub fn parse_earthquakes(collection: UsgsCollection) -> EarthquakeList {
    let earthquakes: Vec<Earthquake> = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let coords = feature.geometry.map(|g| g.coordinates).unwrap_or_default();
            let longitude = coords.first().copied().flatten()?;
            let latitude = coords.get(1).copied().flatten()?;
            let depth_km = coords.get(2).copied().flatten();
            let props = feature.properties;
            Some(Earthquake {
                id: feature.id,
                magnitude: props.as_ref().and_then(|p| p.mag),
                place: props.as_ref().and_then(|p| p.place.clone()),
                time_utc: props
                    .as_ref()
                    .and_then(|p| p.time)
                    .and_then(DateTime::<Utc>::from_timestamp_millis),
                latitude,
                longitude,
                depth_km,
                tsunami_warning: props.as_ref().and_then(|p| p.tsunami).unwrap_or(0) != 0,
                details_url: props.and_then(|p| p.url),
            })
        })
        .collect();

    EarthquakeList {
        count: earthquakes.len(),
        earthquakes,
    }
}

pub async fn fetch_earthquakes(
    client: &FeedClient,
    query: &EarthquakeQuery,
) -> Result<EarthquakeList, FeedError> {
    let end = Utc::now();
    let start = end - Duration::days(i64::from(query.days));
    let params: Vec<(&str, String)> = vec![
        ("format", "geojson".to_string()),
        ("starttime", start.format("%Y-%m-%dT%H:%M:%S").to_string()),
        ("endtime", end.format("%Y-%m-%dT%H:%M:%S").to_string()),
        ("latitude", query.latitude.to_string()),
        ("longitude", query.longitude.to_string()),
        ("maxradiuskm", query.radius_km.to_string()),
        ("minmagnitude", query.min_magnitude.to_string()),
        ("orderby", "time".to_string()),
    ];

    let collection: UsgsCollection =
        get_json("usgs", client.http().get(USGS_URL).query(&params)).await?;
    let list = parse_earthquakes(collection);
    info!(
        "Found {} earthquakes near ({:.2}, {:.2})",
        list.count, query.latitude, query.longitude
    );
    Ok(list)
}
