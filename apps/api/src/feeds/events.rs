//! Open natural events (storms, wildfires, floods, ...) from NASA EONET v3.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::feeds::{get_json, FeedClient, FeedError};

const EONET_URL: &str = "https://eonet.gsfc.nasa.gov/api/v3/events";

#[derive(Debug, Clone, Deserialize)]
pub struct EventQuery {
    /// EONET category id, e.g. `severeStorms`, `wildfires`, `floods`.
    pub category: Option<String>,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

impl EventQuery {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=90).contains(&self.days) {
            return Err("days must be between 1 and 90".to_string());
        }
        Ok(())
    }
}

/// Upstream request parameters.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub days: u32,
    pub category: Option<String>,
    pub limit: u32,
    /// [lon_min, lat_min, lon_max, lat_max]
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub last_update_utc: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventList {
    pub count: usize,
    pub events: Vec<NaturalEvent>,
}

impl EventList {
    /// `{category}: {title} (Updated {YYYY-MM-DD})` per event, joined by `; `.
    pub fn summary(&self) -> Option<String> {
        if self.events.is_empty() {
            return None;
        }
        Some(
            self.events
                .iter()
                .map(|e| {
                    let updated: String = e
                        .last_update_utc
                        .as_deref()
                        .unwrap_or("unknown")
                        .chars()
                        .take(10)
                        .collect();
                    format!(
                        "{}: {} (Updated {})",
                        e.category.as_deref().unwrap_or("uncategorized"),
                        e.title.as_deref().unwrap_or("untitled event"),
                        updated
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct EonetResponse {
    #[serde(default)]
    pub events: Vec<EonetEvent>,
}

#[derive(Debug, Deserialize)]
pub struct EonetEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub categories: Vec<EonetCategory>,
    #[serde(default)]
    pub geometry: Vec<EonetGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct EonetCategory {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EonetGeometry {
    pub date: Option<String>,
    /// `[lon, lat]` for points; nested rings for polygons.
    #[serde(default)]
    pub coordinates: Value,
}

/// Location comes from the most recent geometry, and only when it is a point.
pub fn parse_events(raw: EonetResponse) -> EventList {
    let events: Vec<NaturalEvent> = raw
        .events
        .into_iter()
        .map(|event| {
            let last = event.geometry.last();
            let (latitude, longitude) = last
                .and_then(|g| point_lat_lon(&g.coordinates))
                .map_or((None, None), |(lat, lon)| (Some(lat), Some(lon)));
            NaturalEvent {
                category: event.categories.first().and_then(|c| c.id.clone()),
                last_update_utc: last.and_then(|g| g.date.clone()),
                latitude,
                longitude,
                id: event.id,
                title: event.title,
                link: event.link,
            }
        })
        .collect();

    EventList {
        count: events.len(),
        events,
    }
}

fn point_lat_lon(coordinates: &Value) -> Option<(f64, f64)> {
    match coordinates.as_array()?.as_slice() {
        [lon, lat] => Some((lat.as_f64()?, lon.as_f64()?)),
        _ => None,
    }
}

pub async fn fetch_events(client: &FeedClient, filter: &EventFilter) -> Result<EventList, FeedError> {
    let mut params: Vec<(&str, String)> = vec![
        ("status", "open".to_string()),
        ("days", filter.days.to_string()),
        ("limit", filter.limit.to_string()),
    ];
    if let Some(category) = &filter.category {
        params.push(("category", category.clone()));
    }
    if let Some(bbox) = filter.bbox {
        params.push((
            "bbox",
            bbox.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(","),
        ));
    }

    let raw: EonetResponse = get_json("eonet", client.http().get(EONET_URL).query(&params)).await?;
    let list = parse_events(raw);
    info!("Found {} EONET events", list.count);
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EONET: &str = r#"{
        "title": "EONET Events",
        "events": [
            {
                "id": "EONET_6512",
                "title": "Cyclone Remal",
                "link": "https://eonet.gsfc.nasa.gov/api/v3/events/EONET_6512",
                "categories": [{"id": "severeStorms", "title": "Severe Storms"}],
                "geometry": [
                    {"date": "2024-05-25T00:00:00Z", "type": "Point", "coordinates": [89.6, 19.8]},
                    {"date": "2024-05-26T18:00:00Z", "type": "Point", "coordinates": [89.1, 21.6]}
                ]
            },
            {
                "id": "EONET_7001",
                "title": "Wildfire, Uttarakhand",
                "categories": [{"id": "wildfires"}],
                "geometry": [
                    {"date": "2024-05-20T00:00:00Z", "type": "Polygon", "coordinates": [[[79.0, 30.0], [79.1, 30.0], [79.1, 30.1], [79.0, 30.0]]]}
                ]
            }
        ]
    }"#;

    fn list() -> EventList {
        parse_events(serde_json::from_str(EONET).unwrap())
    }

    #[test]
    fn test_point_uses_last_geometry() {
        let cyclone = &list().events[0];
        assert_eq!(cyclone.category.as_deref(), Some("severeStorms"));
        assert_eq!(cyclone.latitude, Some(21.6));
        assert_eq!(cyclone.longitude, Some(89.1));
        assert_eq!(cyclone.last_update_utc.as_deref(), Some("2024-05-26T18:00:00Z"));
    }

    #[test]
    fn test_polygon_has_no_point_location() {
        let fire = &list().events[1];
        assert!(fire.latitude.is_none());
        assert!(fire.link.is_none());
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            list().summary().unwrap(),
            "severeStorms: Cyclone Remal (Updated 2024-05-26); wildfires: Wildfire, Uttarakhand (Updated 2024-05-20)"
        );
    }

    #[test]
    fn test_query_validation() {
        let q: EventQuery = serde_json::from_str(r#"{"category": null}"#).unwrap();
        assert_eq!(q.days, 7);
        assert!(q.validate().is_ok());
        let q: EventQuery = serde_json::from_str(r#"{"days": 0}"#).unwrap();
        assert!(q.validate().is_err());
    }
}
