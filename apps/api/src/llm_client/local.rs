//! Locally served model behind an OpenAI-compatible `/v1/chat/completions`
//! endpoint (TGI, vLLM, llama.cpp server, LM Studio, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    build_http_client, send_with_retry, Generation, GenerationOptions, LlmBackend, LlmError,
};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

impl ChatResponse {
    pub fn into_generation(self) -> Result<Generation, LlmError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        Ok(Generation {
            text,
            input_tokens: self.usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: self.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

#[derive(Clone)]
pub struct LocalModelClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LocalModelClient {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client()?,
            base_url,
            model,
            api_key,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }
}

#[async_trait]
impl LlmBackend for LocalModelClient {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<Generation, LlmError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: options.max_output_tokens,
            temperature: options.temperature,
        };
        let endpoint = self.endpoint();

        let response = send_with_retry(
            || {
                let req = self.client.post(&endpoint).json(&request_body);
                match &self.api_key {
                    Some(key) => req.bearer_auth(key),
                    None => req,
                }
            },
            |body| {
                serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            },
        )
        .await?;

        let parsed: ChatResponse = response.json().await?;
        let generation = parsed.into_generation()?;

        debug!(
            "Local model call succeeded: model={}, output_tokens={:?}",
            self.model, generation.output_tokens
        );

        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> LocalModelClient {
        LocalModelClient::new(base.to_string(), "m".to_string(), None).unwrap()
    }

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(
            client("http://127.0.0.1:8080/v1").endpoint(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
        assert_eq!(
            client("http://127.0.0.1:8080/").endpoint(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
        assert_eq!(
            client("http://host/v1/chat/completions").endpoint(),
            "http://host/v1/chat/completions"
        );
    }

    #[test]
    fn test_extracts_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "Stay indoors."}}],
                "usage": {"prompt_tokens": 50, "completion_tokens": 3}}"#,
        )
        .unwrap();
        let generation = response.into_generation().unwrap();
        assert_eq!(generation.text, "Stay indoors.");
        assert_eq!(generation.output_tokens, Some(3));
    }

    #[test]
    fn test_null_content_is_empty() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(response.into_generation(), Err(LlmError::EmptyContent)));
    }
}
