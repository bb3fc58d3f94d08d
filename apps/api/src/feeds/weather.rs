//! Current weather by city from OpenWeatherMap (metric units).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::feeds::{get_json, FeedClient, FeedError};

const OWM_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature_c: Option<f64>,
    pub feels_like_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub description: String,
}

impl WeatherReport {
    /// One-line summary used in the assistant prompt.
    pub fn summary(&self) -> String {
        format!(
            "In {}: {}C, {}, Humidity {}%, Wind {} m/s.",
            self.city,
            fmt_opt(self.temperature_c),
            self.description,
            fmt_opt(self.humidity_pct),
            fmt_opt(self.wind_speed_mps)
        )
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "N/A".to_string())
}

#[derive(Debug, Deserialize)]
pub struct OwmResponse {
    pub name: Option<String>,
    pub main: Option<OwmMain>,
    pub wind: Option<OwmWind>,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
pub struct OwmMain {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmWind {
    pub speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmCondition {
    pub description: Option<String>,
}

pub fn parse_weather(requested_city: &str, raw: OwmResponse) -> WeatherReport {
    let main = raw.main;
    WeatherReport {
        city: raw
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| requested_city.to_string()),
        temperature_c: main.as_ref().and_then(|m| m.temp),
        feels_like_c: main.as_ref().and_then(|m| m.feels_like),
        humidity_pct: main.as_ref().and_then(|m| m.humidity),
        pressure_hpa: main.as_ref().and_then(|m| m.pressure),
        wind_speed_mps: raw.wind.and_then(|w| w.speed),
        description: raw
            .weather
            .into_iter()
            .next()
            .and_then(|c| c.description)
            .unwrap_or_else(|| "N/A".to_string()),
    }
}

pub async fn fetch_weather(client: &FeedClient, city: &str) -> Result<WeatherReport, FeedError> {
    let api_key = client
        .openweathermap_api_key
        .as_deref()
        .ok_or(FeedError::MissingApiKey("OPENWEATHERMAP_API_KEY"))?;

    let request = client
        .http()
        .get(OWM_URL)
        .query(&[("q", city), ("appid", api_key), ("units", "metric")]);

    let raw: OwmResponse = match get_json("openweathermap", request).await {
        Ok(raw) => raw,
        Err(FeedError::Upstream { status: 404, .. }) => {
            return Err(FeedError::NotFound(format!("City '{city}' not found")));
        }
        Err(e) => return Err(e),
    };

    let report = parse_weather(city, raw);
    info!("Fetched weather for {}", report.city);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUMBAI: &str = r#"{
        "coord": {"lon": 72.85, "lat": 19.01},
        "weather": [{"id": 721, "main": "Haze", "description": "haze", "icon": "50d"}],
        "main": {"temp": 31.99, "feels_like": 38.99, "temp_min": 31.94, "temp_max": 31.99, "pressure": 1006, "humidity": 66},
        "wind": {"speed": 5.66, "deg": 260},
        "name": "Mumbai",
        "cod": 200
    }"#;

    #[test]
    fn test_parse_weather_payload() {
        let raw: OwmResponse = serde_json::from_str(MUMBAI).unwrap();
        let report = parse_weather("mumbai", raw);
        assert_eq!(report.city, "Mumbai");
        assert_eq!(report.temperature_c, Some(31.99));
        assert_eq!(report.humidity_pct, Some(66.0));
        assert_eq!(report.pressure_hpa, Some(1006.0));
        assert_eq!(report.description, "haze");
    }

    #[test]
    fn test_summary_format() {
        let raw: OwmResponse = serde_json::from_str(MUMBAI).unwrap();
        assert_eq!(
            parse_weather("mumbai", raw).summary(),
            "In Mumbai: 31.99C, haze, Humidity 66%, Wind 5.66 m/s."
        );
    }

    #[test]
    fn test_sparse_payload_falls_back() {
        let raw: OwmResponse = serde_json::from_str(r#"{"cod": 200}"#).unwrap();
        let report = parse_weather("Pune", raw);
        assert_eq!(report.city, "Pune");
        assert_eq!(report.description, "N/A");
        assert!(report.summary().contains("N/AC"));
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let client = FeedClient::new(None, None).unwrap();
        assert!(matches!(
            fetch_weather(&client, "Mumbai").await,
            Err(FeedError::MissingApiKey("OPENWEATHERMAP_API_KEY"))
        ));
    }
}
