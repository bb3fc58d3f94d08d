//! Terminal frontend for the disaster assistant.
//!
//! Sends one query to `POST /process` and prints the answer.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "ask")]
#[command(author, version, about = "Ask the disaster management assistant a question")]
struct Cli {
    /// The question, e.g. `what should I do during a cyclone`
    #[arg(required = true)]
    query: Vec<String>,

    /// City or region the question is about
    #[arg(short, long)]
    location: Option<String>,

    /// Upper bound on the length of the answer
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u32).range(50..=1024))]
    max_new_tokens: u32,

    /// Base URL of the assistant API
    #[arg(long, env = "DISASTER_API_URL", default_value = "http://127.0.0.1:8000")]
    backend_url: String,

    /// Shared secret sent as `X-API-Key`
    #[arg(long, env = "API_SECRET_KEY", hide_env_values = true)]
    api_key: String,

    /// Also print the live context and reference records that were used
    #[arg(long)]
    show_context: bool,
}

#[derive(Serialize)]
struct ProcessRequest<'a> {
    text_input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_context: Option<&'a str>,
    max_new_tokens: u32,
}

#[derive(Deserialize)]
struct ProcessResponse {
    llm_response: String,
    #[serde(default)]
    llm_backend: String,
    context_used_summary: ContextSummary,
    #[serde(default)]
    knowledge_matches: Vec<KnowledgeMatch>,
}

#[derive(Deserialize)]
struct ContextSummary {
    location_info: String,
    current_weather: Option<String>,
    recent_earthquakes: Option<String>,
    recent_natural_events: Option<String>,
    related_news_headlines: Option<String>,
}

#[derive(Deserialize)]
struct KnowledgeMatch {
    source: String,
    line: usize,
    score: f64,
    snippet: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap prints help/version to stdout and usage errors to stderr.
            let _ = e.print();
            return if is_informational(&e) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let query = cli.query.join(" ");
    let query = query.trim();
    if query.is_empty() {
        bail!("please enter a question");
    }
    let location = cli
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(180))
        .build()?;
    let url = process_url(&cli.backend_url);

    let response = http
        .post(&url)
        .header("X-API-Key", &cli.api_key)
        .json(&ProcessRequest {
            text_input: query,
            location_context: location,
            max_new_tokens: cli.max_new_tokens,
        })
        .send()
        .await
        .with_context(|| format!("could not reach the assistant at {url}"))?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("{}", describe_error(status.as_u16(), &body));
    }

    let answer: ProcessResponse =
        serde_json::from_str(&body).context("unexpected response from the assistant")?;
    print!("{}", render(&answer, cli.show_context));
    Ok(())
}

/// `--help` and `--version` are not failures; every other parse error exits 1.
fn is_informational(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

fn process_url(base: &str) -> String {
    format!("{}/process", base.trim_end_matches('/'))
}

fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => format!("{} ({status}): {}", error.code, error.message),
        Err(_) => format!("backend returned status {status}: {}", body.trim()),
    }
}

fn render(answer: &ProcessResponse, show_context: bool) -> String {
    let mut out = format!("{}\n", answer.llm_response.trim());
    if !show_context {
        return out;
    }

    let summary = &answer.context_used_summary;
    out.push_str(&format!("\n--- Context ({}) ---\n", answer.llm_backend));
    out.push_str(&format!("Location: {}\n", summary.location_info));
    for (label, value) in [
        ("Weather", &summary.current_weather),
        ("Earthquakes", &summary.recent_earthquakes),
        ("Natural events", &summary.recent_natural_events),
        ("News", &summary.related_news_headlines),
    ] {
        if let Some(value) = value {
            out.push_str(&format!("{label}: {value}\n"));
        }
    }

    if answer.knowledge_matches.is_empty() {
        out.push_str("Reference records: none\n");
    } else {
        out.push_str("Reference records:\n");
        for m in &answer.knowledge_matches {
            out.push_str(&format!(
                "  [{:.1}] {}:{} {}\n",
                m.score, m.source, m.line, m.snippet
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessResponse {
        serde_json::from_str(
            r#"{
                "request_id": "9b2f0c4e-3f57-4c2a-9d8e-1f6a2b7c8d90",
                "user_query": "flood",
                "location_context_provided": "Patna",
                "context_used_summary": {
                    "location_info": "Patna (25.59, 85.14)",
                    "current_weather": "In Patna: 30C, rain",
                    "recent_earthquakes": null,
                    "recent_natural_events": null,
                    "related_news_headlines": null
                },
                "knowledge_matches": [
                    {"source": "floods.jsonl", "line": 3, "score": 3.0, "snippet": "region: Bihar"}
                ],
                "llm_backend": "gemini",
                "llm_response": "  Move to higher ground.  "
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_answer_only() {
        assert_eq!(render(&sample(), false), "Move to higher ground.\n");
    }

    #[test]
    fn test_render_with_context() {
        let out = render(&sample(), true);
        assert!(out.contains("Location: Patna (25.59, 85.14)"));
        assert!(out.contains("Weather: In Patna: 30C, rain"));
        assert!(!out.contains("Earthquakes:"));
        assert!(out.contains("[3.0] floods.jsonl:3 region: Bihar"));
    }

    #[test]
    fn test_describe_structured_error() {
        let body = r#"{"error": {"code": "UNAUTHORIZED", "message": "Invalid API Key"}}"#;
        assert_eq!(describe_error(401, body), "UNAUTHORIZED (401): Invalid API Key");
        assert_eq!(
            describe_error(502, "Bad Gateway"),
            "backend returned status 502: Bad Gateway"
        );
    }

    #[test]
    fn test_process_url_strips_trailing_slash() {
        assert_eq!(process_url("http://localhost:8000/"), "http://localhost:8000/process");
    }

    #[test]
    fn test_usage_errors_are_failures() {
        let err = Cli::try_parse_from(["ask", "--api-key", "k", "--max-new-tokens", "5000", "q"])
            .err()
            .unwrap();
        assert!(!is_informational(&err));

        let err = Cli::try_parse_from(["ask", "--api-key", "k"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(!is_informational(&err));
    }

    #[test]
    fn test_help_and_version_are_informational() {
        let err = Cli::try_parse_from(["ask", "--help"]).err().unwrap();
        assert!(is_informational(&err));
        let err = Cli::try_parse_from(["ask", "--version"]).err().unwrap();
        assert!(is_informational(&err));
    }

    #[test]
    fn test_cli_parses_query_words() {
        let cli = Cli::try_parse_from([
            "ask",
            "--api-key",
            "k",
            "--location",
            "Chennai",
            "cyclone",
            "safety",
        ])
        .unwrap();
        assert_eq!(cli.query.join(" "), "cyclone safety");
        assert_eq!(cli.location.as_deref(), Some("Chennai"));
        assert_eq!(cli.max_new_tokens, 300);
    }
}
