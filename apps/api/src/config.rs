use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which LLM backend answers `/process` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackendKind {
    /// Hosted Gemini API (needs GOOGLE_API_KEY).
    Gemini,
    /// Locally served model behind an OpenAI-compatible chat endpoint.
    Local,
}

impl FromStr for LlmBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "local" => Ok(Self::Local),
            other => bail!("LLM_BACKEND must be 'gemini' or 'local', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_secret_key: String,
    pub llm_backend: LlmBackendKind,
    pub google_api_key: Option<String>,
    pub local_llm_url: String,
    pub local_llm_model: String,
    pub local_llm_api_key: Option<String>,
    pub openweathermap_api_key: Option<String>,
    pub newsapi_key: Option<String>,
    pub data_dir: PathBuf,
    pub enable_live_context: bool,
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_secret_key: require_env("API_SECRET_KEY")?,
            llm_backend: optional_env("LLM_BACKEND")
                .unwrap_or_else(|| "gemini".to_string())
                .parse()?,
            google_api_key: optional_env("GOOGLE_API_KEY"),
            local_llm_url: optional_env("LOCAL_LLM_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8080/v1".to_string()),
            local_llm_model: optional_env("LOCAL_LLM_MODEL")
                .unwrap_or_else(|| "local-model".to_string()),
            local_llm_api_key: optional_env("LOCAL_LLM_API_KEY"),
            openweathermap_api_key: optional_env("OPENWEATHERMAP_API_KEY"),
            newsapi_key: optional_env("NEWSAPI_KEY"),
            data_dir: PathBuf::from(optional_env("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            enable_live_context: match optional_env("ENABLE_LIVE_CONTEXT") {
                Some(v) => parse_bool(&v)
                    .with_context(|| format!("ENABLE_LIVE_CONTEXT must be a boolean, got '{v}'"))?,
                None => true,
            },
            host: optional_env("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: optional_env("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<LlmBackendKind>().unwrap(), LlmBackendKind::Gemini);
        assert_eq!(" local ".parse::<LlmBackendKind>().unwrap(), LlmBackendKind::Local);
    }

    #[test]
    fn test_backend_kind_rejects_unknown() {
        assert!("openai".parse::<LlmBackendKind>().is_err());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
