//! Disaster-related headlines from NewsAPI `/v2/everything`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::feeds::{get_json, FeedClient, FeedError};

const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";

#[derive(Debug, Clone, Deserialize)]
pub struct NewsQuery {
    pub search_query: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    5
}

impl NewsQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.search_query.trim().is_empty() {
            return Err("search_query cannot be empty".to_string());
        }
        if !(1..=20).contains(&self.page_size) {
            return Err("page_size must be between 1 and 20".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsResults {
    pub total_results: u64,
    pub articles: Vec<Article>,
}

impl NewsResults {
    /// `'{title}' ({source})` per article, joined by `; `.
    pub fn summary(&self) -> Option<String> {
        if self.total_results == 0 || self.articles.is_empty() {
            return None;
        }
        Some(
            self.articles
                .iter()
                .map(|a| {
                    format!(
                        "'{}' ({})",
                        a.title.as_deref().unwrap_or("untitled"),
                        a.source.as_deref().unwrap_or("unknown source")
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    pub status: String,
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiArticle {
    pub source: Option<NewsApiSource>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsApiSource {
    pub name: Option<String>,
}

pub fn parse_news(raw: NewsApiResponse) -> Result<NewsResults, FeedError> {
    if raw.status != "ok" {
        return Err(FeedError::Upstream {
            provider: "newsapi",
            status: 200,
            message: format!(
                "{} - {}",
                raw.code.as_deref().unwrap_or("unknown"),
                raw.message.as_deref().unwrap_or("no message")
            ),
        });
    }

    Ok(NewsResults {
        total_results: raw.total_results,
        articles: raw
            .articles
            .into_iter()
            .map(|a| Article {
                title: a.title,
                source: a.source.and_then(|s| s.name),
                description: a.description,
                url: a.url,
                published_at: a.published_at,
            })
            .collect(),
    })
}

pub async fn fetch_news(
    client: &FeedClient,
    search_query: &str,
    page_size: u32,
) -> Result<NewsResults, FeedError> {
    let api_key = client
        .newsapi_key
        .as_deref()
        .ok_or(FeedError::MissingApiKey("NEWSAPI_KEY"))?;

    let page_size = page_size.to_string();
    let request = client
        .http()
        .get(NEWSAPI_URL)
        .header("X-Api-Key", api_key)
        .query(&[
            ("q", search_query),
            ("language", "en"),
            ("pageSize", page_size.as_str()),
            ("sortBy", "relevancy"),
        ]);

    let raw: NewsApiResponse = get_json("newsapi", request).await?;
    let results = parse_news(raw)?;
    info!("Found {} news articles", results.total_results);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_payload() {
        let raw: NewsApiResponse = serde_json::from_str(
            r#"{
                "status": "ok",
                "totalResults": 42,
                "articles": [
                    {"source": {"id": null, "name": "The Hindu"}, "author": "Staff", "title": "Cyclone Remal makes landfall", "description": "Heavy rain in coastal Bengal", "url": "https://example.org/a", "publishedAt": "2024-05-26T20:00:00Z"},
                    {"source": {"id": "bbc-news", "name": "BBC News"}, "title": "Evacuations in Sundarbans", "url": "https://example.org/b", "publishedAt": "2024-05-26T18:00:00Z"}
                ]
            }"#,
        )
        .unwrap();
        let results = parse_news(raw).unwrap();
        assert_eq!(results.total_results, 42);
        assert_eq!(results.articles[0].source.as_deref(), Some("The Hindu"));
        assert_eq!(
            results.summary().unwrap(),
            "'Cyclone Remal makes landfall' (The Hindu); 'Evacuations in Sundarbans' (BBC News)"
        );
    }

    #[test]
    fn test_error_status_is_upstream_error() {
        let raw: NewsApiResponse = serde_json::from_str(
            r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid."}"#,
        )
        .unwrap();
        match parse_news(raw) {
            Err(FeedError::Upstream { message, .. }) => assert!(message.starts_with("apiKeyInvalid")),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_results_has_no_summary() {
        let results = NewsResults {
            total_results: 0,
            articles: vec![],
        };
        assert!(results.summary().is_none());
    }

    #[test]
    fn test_query_validation() {
        let q: NewsQuery = serde_json::from_str(r#"{"search_query": "  "}"#).unwrap();
        assert!(q.validate().is_err());
        let q: NewsQuery = serde_json::from_str(r#"{"search_query": "flood", "page_size": 21}"#).unwrap();
        assert!(q.validate().is_err());
        let q: NewsQuery = serde_json::from_str(r#"{"search_query": "flood"}"#).unwrap();
        assert_eq!(q.page_size, 5);
        assert!(q.validate().is_ok());
    }
}
