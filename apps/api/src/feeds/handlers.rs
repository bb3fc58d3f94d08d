//! Direct access to the live feeds, for dashboards and debugging.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::feeds::earthquakes::{fetch_earthquakes, EarthquakeList, EarthquakeQuery};
use crate::feeds::events::{fetch_events, EventFilter, EventList, EventQuery};
use crate::feeds::news::{fetch_news, NewsQuery, NewsResults};
use crate::feeds::weather::{fetch_weather, WeatherQuery, WeatherReport};
use crate::feeds::INDIA_BBOX;
use crate::state::AppState;

const EVENT_LIMIT: u32 = 20;

/// POST /context/weather
pub async fn handle_weather(
    State(state): State<AppState>,
    Json(query): Json<WeatherQuery>,
) -> Result<Json<WeatherReport>, AppError> {
    let city = query.city.trim();
    if city.is_empty() {
        return Err(AppError::Validation("city cannot be empty".to_string()));
    }
    Ok(Json(fetch_weather(&state.feeds, city).await?))
}

/// POST /context/earthquakes
pub async fn handle_earthquakes(
    State(state): State<AppState>,
    Json(query): Json<EarthquakeQuery>,
) -> Result<Json<EarthquakeList>, AppError> {
    query.validate().map_err(AppError::Validation)?;
    Ok(Json(fetch_earthquakes(&state.feeds, &query).await?))
}

/// POST /context/natural_events
///
/// Always scoped to the India bounding box.
pub async fn handle_natural_events(
    State(state): State<AppState>,
    Json(query): Json<EventQuery>,
) -> Result<Json<EventList>, AppError> {
    query.validate().map_err(AppError::Validation)?;
    let filter = EventFilter {
        days: query.days,
        category: query.category.filter(|c| !c.trim().is_empty()),
        limit: EVENT_LIMIT,
        bbox: Some(INDIA_BBOX),
    };
    Ok(Json(fetch_events(&state.feeds, &filter).await?))
}

/// POST /context/news
pub async fn handle_news(
    State(state): State<AppState>,
    Json(query): Json<NewsQuery>,
) -> Result<Json<NewsResults>, AppError> {
    query.validate().map_err(AppError::Validation)?;
    Ok(Json(
        fetch_news(&state.feeds, query.search_query.trim(), query.page_size).await?,
    ))
}
