//! Assistant pipeline. Answers one user query.
//!
//! Flow: validate → resolve location → gather live context (concurrently) →
//!       search context store → build prompt → LLM generate → response.
//!
//! Live-context failures never fail the request; they are logged and left out
//! of the prompt. Only validation, a missing LLM backend and LLM errors
//! surface to the caller.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::assistant::prompts::{
    ASSISTANT_PROMPT_TEMPLATE, ASSISTANT_ROLE, NO_REALTIME_CONTEXT, NO_REFERENCE_RECORDS,
};
use crate::errors::AppError;
use crate::feeds::earthquakes::{fetch_earthquakes, EarthquakeQuery};
use crate::feeds::events::{fetch_events, EventFilter};
use crate::feeds::geocode::{Coordinates, Geocoder};
use crate::feeds::news::fetch_news;
use crate::feeds::weather::fetch_weather;
use crate::feeds::{FeedClient, DEFAULT_LAT, DEFAULT_LON, INDIA_BBOX};
use crate::knowledge::search::KnowledgeMatch;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, SAFETY_INSTRUCTION};
use crate::llm_client::GenerationOptions;
use crate::state::AppState;

pub const MIN_NEW_TOKENS: u32 = 50;
pub const MAX_NEW_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.6;
const KNOWLEDGE_LIMIT: usize = 5;

const QUAKE_RADIUS_KM: u32 = 1500;
const QUAKE_DAYS: u32 = 7;
const QUAKE_MIN_MAGNITUDE: f64 = 4.0;
const QUAKE_SUMMARY_COUNT: usize = 3;
const EVENT_DAYS: u32 = 10;
const EVENT_LIMIT: u32 = 5;
const NEWS_PAGE_SIZE: u32 = 3;
const NEWS_QUERY_CHARS: usize = 80;
const NEWS_HAZARD_TERMS: &str =
    "disaster OR flood OR cyclone OR earthquake OR heatwave OR landslide";

// ────────────────────────────────────────────────────────────────────────────
// Request / response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub text_input: String,
    pub location_context: Option<String>,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

fn default_max_new_tokens() -> u32 {
    300
}

/// The context that went into the prompt, echoed back to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSummary {
    pub location_info: String,
    pub current_weather: Option<String>,
    pub recent_earthquakes: Option<String>,
    pub recent_natural_events: Option<String>,
    pub related_news_headlines: Option<String>,
}

impl ContextSummary {
    /// `- {Label}: {value}` for every live-context item that was retrieved.
    pub fn realtime_lines(&self) -> Vec<String> {
        [
            ("Current Weather", &self.current_weather),
            ("Recent Earthquakes", &self.recent_earthquakes),
            ("Recent Natural Events", &self.recent_natural_events),
            ("Related News Headlines", &self.related_news_headlines),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("- {label}: {v}")))
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub request_id: Uuid,
    pub user_query: String,
    pub location_context_provided: Option<String>,
    pub context_used_summary: ContextSummary,
    pub knowledge_matches: Vec<KnowledgeMatch>,
    pub llm_backend: String,
    pub llm_response: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Location
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    /// The user-supplied place name, if any.
    pub name: Option<String>,
    pub coords: Coordinates,
    pub geocoded: bool,
    pub detail: String,
}

fn default_coords() -> Coordinates {
    Coordinates {
        latitude: DEFAULT_LAT,
        longitude: DEFAULT_LON,
    }
}

fn default_detail() -> String {
    format!("Default location ({DEFAULT_LAT:.2}, {DEFAULT_LON:.2})")
}

/// Geocodes the user's location, falling back to the centre of India.
pub async fn resolve_location(geocoder: &Geocoder, location: Option<&str>) -> ResolvedLocation {
    let Some(name) = location.map(str::trim).filter(|l| !l.is_empty()) else {
        return ResolvedLocation {
            name: None,
            coords: default_coords(),
            geocoded: false,
            detail: default_detail(),
        };
    };

    match geocoder.lookup(name).await {
        Ok(coords) => ResolvedLocation {
            name: Some(name.to_string()),
            coords,
            geocoded: true,
            detail: format!("{name} ({:.2}, {:.2})", coords.latitude, coords.longitude),
        },
        Err(e) => {
            warn!("Geocoding failed for '{name}': {e}. Using default location.");
            ResolvedLocation {
                name: Some(name.to_string()),
                coords: default_coords(),
                geocoded: false,
                detail: format!("{} (Geocoding failed for: {name})", default_detail()),
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Live context
// ────────────────────────────────────────────────────────────────────────────

pub fn news_search_query(text: &str, location: Option<&str>) -> String {
    let head: String = text.chars().take(NEWS_QUERY_CHARS).collect();
    format!(
        "({}) AND ({}) AND ({NEWS_HAZARD_TERMS})",
        head.trim(),
        location.unwrap_or("India")
    )
}

/// Fetches weather, earthquakes, natural events and news concurrently.
/// Each feed that fails is logged and left as `None`.
pub async fn gather_live_context(
    feeds: &FeedClient,
    location: &ResolvedLocation,
    text: &str,
    summary: &mut ContextSummary,
) {
    let weather = async {
        match (&location.name, location.geocoded) {
            (Some(city), true) => match fetch_weather(feeds, city).await {
                Ok(report) => Some(report.summary()),
                Err(e) => {
                    warn!("Weather unavailable for {city}: {e}");
                    None
                }
            },
            _ => None,
        }
    };

    let quake_query = EarthquakeQuery {
        latitude: location.coords.latitude,
        longitude: location.coords.longitude,
        radius_km: QUAKE_RADIUS_KM,
        days: QUAKE_DAYS,
        min_magnitude: QUAKE_MIN_MAGNITUDE,
    };
    let quakes = async {
        match fetch_earthquakes(feeds, &quake_query).await {
            Ok(list) => list.summary(QUAKE_SUMMARY_COUNT),
            Err(e) => {
                warn!("Earthquake feed unavailable: {e}");
                None
            }
        }
    };

    let event_filter = EventFilter {
        days: EVENT_DAYS,
        category: None,
        limit: EVENT_LIMIT,
        bbox: Some(INDIA_BBOX),
    };
    let events = async {
        match fetch_events(feeds, &event_filter).await {
            Ok(list) => list.summary(),
            Err(e) => {
                warn!("EONET feed unavailable: {e}");
                None
            }
        }
    };

    let news_query = news_search_query(text, location.name.as_deref());
    let news = async {
        match fetch_news(feeds, &news_query, NEWS_PAGE_SIZE).await {
            Ok(results) => results.summary(),
            Err(e) => {
                warn!("News feed unavailable: {e}");
                None
            }
        }
    };

    let (weather, quakes, events, news) = tokio::join!(weather, quakes, events, news);
    summary.current_weather = weather;
    summary.recent_earthquakes = quakes;
    summary.recent_natural_events = events;
    summary.related_news_headlines = news;
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt
// ────────────────────────────────────────────────────────────────────────────

/// Fills `{key}` placeholders in one left-to-right pass, so substituted values
/// are never themselves re-scanned for placeholders.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replacement = after.find('}').and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, end))
        });
        match replacement {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn build_prompt(
    summary: &ContextSummary,
    matches: &[KnowledgeMatch],
    user_request: &str,
    now: DateTime<Utc>,
) -> String {
    let realtime = summary.realtime_lines();
    let realtime = if realtime.is_empty() {
        NO_REALTIME_CONTEXT.to_string()
    } else {
        realtime.join("\n")
    };

    let references = if matches.is_empty() {
        NO_REFERENCE_RECORDS.to_string()
    } else {
        matches
            .iter()
            .enumerate()
            .map(|(i, m)| format!("[{}] ({}:{}) {}", i + 1, m.source, m.line, m.snippet))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let current_time = now.format("%Y-%m-%d %H:%M:%S UTC").to_string();

    fill_template(
        ASSISTANT_PROMPT_TEMPLATE,
        &[
            ("role", ASSISTANT_ROLE),
            ("current_time", &current_time),
            ("location_info", &summary.location_info),
            ("realtime_context", &realtime),
            ("reference_records", &references),
            ("user_request", user_request.trim()),
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("safety_instruction", SAFETY_INSTRUCTION),
        ],
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub fn validate(request: &ProcessRequest) -> Result<(), AppError> {
    if request.text_input.trim().is_empty() {
        return Err(AppError::Validation("text_input cannot be empty".to_string()));
    }
    if !(MIN_NEW_TOKENS..=MAX_NEW_TOKENS).contains(&request.max_new_tokens) {
        return Err(AppError::Validation(format!(
            "max_new_tokens must be between {MIN_NEW_TOKENS} and {MAX_NEW_TOKENS}"
        )));
    }
    Ok(())
}

/// Runs the full assistant pipeline for one request.
pub async fn process_query(
    state: &AppState,
    request: ProcessRequest,
) -> Result<ProcessResponse, AppError> {
    validate(&request)?;

    let llm = state.llm.clone().ok_or_else(|| {
        AppError::ServiceUnavailable("LLM service is not configured or unavailable".to_string())
    })?;

    let request_id = Uuid::new_v4();
    let started = Instant::now();
    info!(
        "[{request_id}] Processing query '{}' (location: {:?})",
        request.text_input.chars().take(50).collect::<String>(),
        request.location_context
    );

    // Step 1: Location
    let location = resolve_location(&state.geocoder, request.location_context.as_deref()).await;
    let mut summary = ContextSummary {
        location_info: location.detail.clone(),
        ..ContextSummary::default()
    };

    // Step 2: Live context
    if state.config.enable_live_context {
        let gather_started = Instant::now();
        gather_live_context(&state.feeds, &location, &request.text_input, &mut summary).await;
        info!(
            "[{request_id}] Live context gathered in {:.2}s",
            gather_started.elapsed().as_secs_f64()
        );
    }

    // Step 3: Reference records
    let knowledge_matches = state
        .store
        .search(
            &request.text_input,
            location.name.as_deref(),
            KNOWLEDGE_LIMIT,
        )
        .await;

    // Step 4: Prompt
    let prompt = build_prompt(&summary, &knowledge_matches, &request.text_input, Utc::now());
    info!(
        "[{request_id}] Prompt built ({} chars, {} reference records), calling {}",
        prompt.len(),
        knowledge_matches.len(),
        llm.name()
    );

    // Step 5: Generate
    let llm_started = Instant::now();
    let generation = llm
        .generate(
            &prompt,
            GenerationOptions {
                max_output_tokens: request.max_new_tokens,
                temperature: TEMPERATURE,
            },
        )
        .await?;
    info!(
        "[{request_id}] LLM answered in {:.2}s ({} chars); total {:.2}s",
        llm_started.elapsed().as_secs_f64(),
        generation.text.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(ProcessResponse {
        request_id,
        user_query: request.text_input,
        location_context_provided: request.location_context,
        context_used_summary: summary,
        knowledge_matches,
        llm_backend: llm.name().to_string(),
        llm_response: generation.text,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 26, 14, 30, 0).unwrap()
    }

    fn sample_match() -> KnowledgeMatch {
        KnowledgeMatch {
            source: "cyclones.jsonl".to_string(),
            line: 4,
            score: 3.0,
            snippet: "hazard: cyclone; guidance: Secure loose objects".to_string(),
        }
    }

    #[test]
    fn test_prompt_contains_every_section() {
        let summary = ContextSummary {
            location_info: "Kolkata (22.57, 88.36)".to_string(),
            current_weather: Some("In Kolkata: 31C, rain".to_string()),
            related_news_headlines: Some("'Cyclone Remal nears coast' (PTI)".to_string()),
            ..ContextSummary::default()
        };
        let prompt = build_prompt(
            &summary,
            &[sample_match()],
            "  What should I do before Cyclone Remal?  ",
            now(),
        );

        assert!(prompt.contains("Current Time: 2024-05-26 14:30:00 UTC"));
        assert!(prompt.contains("Location Context: Kolkata (22.57, 88.36)"));
        assert!(prompt.contains("- Current Weather: In Kolkata: 31C, rain"));
        assert!(prompt.contains("- Related News Headlines: 'Cyclone Remal nears coast' (PTI)"));
        assert!(!prompt.contains("Recent Earthquakes"));
        assert!(prompt.contains("[1] (cyclones.jsonl:4) hazard: cyclone; guidance: Secure loose objects"));
        assert!(prompt.contains("User's Request: What should I do before Cyclone Remal?\n"));
        assert!(prompt.contains(GROUNDING_INSTRUCTION));
        assert!(prompt.trim_end().ends_with("Response:"));
    }

    #[test]
    fn test_prompt_states_missing_context() {
        let summary = ContextSummary {
            location_info: default_detail(),
            ..ContextSummary::default()
        };
        let prompt = build_prompt(&summary, &[], "Heatwave tips", now());
        assert!(prompt.contains(NO_REALTIME_CONTEXT));
        assert!(prompt.contains(NO_REFERENCE_RECORDS));
        assert!(prompt.contains("Default location (20.59, 78.96)"));
    }

    #[test]
    fn test_user_text_is_not_rescanned_for_placeholders() {
        let summary = ContextSummary::default();
        let prompt = build_prompt(&summary, &[], "print {role} and {", now());
        assert!(prompt.contains("User's Request: print {role} and {"));
    }

    #[test]
    fn test_fill_template_leaves_unknown_placeholders() {
        assert_eq!(
            fill_template("a {x} b {y} c {", &[("x", "1")]),
            "a 1 b {y} c {"
        );
    }

    #[test]
    fn test_news_query_uses_location_or_india() {
        assert_eq!(
            news_search_query("Flood risk", Some("Patna")),
            format!("(Flood risk) AND (Patna) AND ({NEWS_HAZARD_TERMS})")
        );
        let long = "x".repeat(200);
        let q = news_search_query(&long, None);
        assert!(q.starts_with(&format!("({}) AND (India)", "x".repeat(80))));
    }

    #[test]
    fn test_validate_bounds() {
        let mut req = ProcessRequest {
            text_input: "Earthquake safety".to_string(),
            location_context: None,
            max_new_tokens: 300,
        };
        assert!(validate(&req).is_ok());
        req.max_new_tokens = 49;
        assert!(validate(&req).is_err());
        req.max_new_tokens = 1024;
        assert!(validate(&req).is_ok());
        req.text_input = "   ".to_string();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn test_request_defaults() {
        let req: ProcessRequest =
            serde_json::from_str(r#"{"text_input": "Landslide warning signs"}"#).unwrap();
        assert_eq!(req.max_new_tokens, 300);
        assert!(req.location_context.is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_location_uses_default() {
        let geocoder = Geocoder::new().unwrap();
        let resolved = resolve_location(&geocoder, Some("   ")).await;
        assert!(resolved.name.is_none());
        assert!(!resolved.geocoded);
        assert_eq!(resolved.detail, "Default location (20.59, 78.96)");
    }

    #[test]
    fn test_realtime_lines_order() {
        let summary = ContextSummary {
            location_info: String::new(),
            current_weather: Some("w".to_string()),
            recent_earthquakes: Some("q".to_string()),
            recent_natural_events: Some("e".to_string()),
            related_news_headlines: None,
        };
        assert_eq!(
            summary.realtime_lines(),
            vec![
                "- Current Weather: w",
                "- Recent Earthquakes: q",
                "- Recent Natural Events: e"
            ]
        );
    }
}
