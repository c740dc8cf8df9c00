use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{API_KEY_ENV, ApiFailure, DEFAULT_BASE_URL, check_response, endpoint, http_client};
use crate::document::TokenUsage;
use crate::error::{RagError, Result};
use crate::generation::{Generation, GenerativeModel, TextStream};

/// Sentinel `data` payload that ends an OpenAI event stream.
const DONE: &str = "[DONE]";

/// A [`GenerativeModel`] backed by the OpenAI chat completions API.
///
/// The prompt is sent as a single user message. Streaming responses are
/// read as server-sent events; dropping the returned stream drops the HTTP
/// response and closes the connection.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIChatModel;
///
/// let model = OpenAIChatModel::from_env("gpt-4o-mini")?.with_temperature(0.0);
/// let generation = model.generate("Say hello").await?;
/// ```
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAIChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::InvalidConfiguration(
                "OpenAI API key must not be empty".to_string(),
            ));
        }
        let client = http_client().map_err(|e| {
            RagError::InvalidConfiguration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        })
    }

    /// Create a model using the `OPENAI_API_KEY` environment variable.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            RagError::InvalidConfiguration(format!("{API_KEY_ENV} environment variable not set"))
        })?;
        Self::new(api_key, model)
    }

    /// Point at an OpenAI-compatible server (Ollama, vLLM, ...).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn request<'a>(&'a self, prompt: &'a str, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    async fn send(
        &self,
        body: &ChatRequest<'_>,
    ) -> std::result::Result<reqwest::Response, ApiFailure> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        check_response(response).await
    }

    fn error(&self, failure: ApiFailure) -> RagError {
        error!(
            model = %self.model,
            retriable = failure.retriable,
            error = %failure.message,
            "chat request failed"
        );
        RagError::GenerationError {
            model: self.model.clone(),
            message: failure.message,
            retriable: failure.retriable,
        }
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// With `include_usage`, the last chunk has no choices and carries usage.
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

fn parse_response(body: &str) -> serde_json::Result<Generation> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    Ok(Generation { text, usage: response.usage.map(TokenUsage::from) })
}

/// The text and usage carried by one streamed event.
fn parse_chunk(data: &str) -> serde_json::Result<Generation> {
    let chunk: ChatChunk = serde_json::from_str(data)?;
    let text = chunk.choices.into_iter().next().and_then(|c| c.delta.content).unwrap_or_default();
    Ok(Generation { text, usage: chunk.usage.map(TokenUsage::from) })
}

// ── GenerativeModel implementation ─────────────────────────────────

#[async_trait]
impl GenerativeModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        debug!(model = %self.model, prompt_len = prompt.len(), "chat completion");
        let response = self.send(&self.request(prompt, false)).await.map_err(|f| self.error(f))?;
        let body = response.text().await.map_err(|e| self.error(ApiFailure::from(e)))?;
        parse_response(&body).map_err(|e| {
            RagError::generation(&self.model, format!("failed to parse response: {e}"))
        })
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        debug!(model = %self.model, prompt_len = prompt.len(), "streaming chat completion");
        let response = self.send(&self.request(prompt, true)).await.map_err(|f| self.error(f))?;
        let model = self.model.clone();

        let stream = try_stream! {
            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| {
                    RagError::generation_transient(
                        model.as_str(),
                        format!("stream interrupted: {e}"),
                    )
                })?;
                if event.data == DONE {
                    break;
                }
                let increment = parse_chunk(&event.data).map_err(|e| {
                    RagError::generation(model.as_str(), format!("malformed stream event: {e}"))
                })?;
                if !increment.text.is_empty() || increment.usage.is_some() {
                    yield increment;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completion_with_usage() {
        let body = r#"{
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
        }"#;
        let generation = parse_response(body).unwrap();
        assert_eq!(generation.text, "Paris.");
        assert_eq!(generation.usage.unwrap().total_tokens, 14);
    }

    #[test]
    fn parses_stream_chunks() {
        let first = r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#;
        let middle = r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        let last = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        let usage = concat!(
            r#"{"choices":[],"#,
            r#""usage":{"prompt_tokens":9,"completion_tokens":3,"total_tokens":12}}"#
        );
        assert_eq!(parse_chunk(first).unwrap(), Generation::new(""));
        assert_eq!(parse_chunk(middle).unwrap(), Generation::new("Hel"));
        assert_eq!(parse_chunk(last).unwrap(), Generation::new(""));
        let tail = parse_chunk(usage).unwrap();
        assert!(tail.text.is_empty());
        assert_eq!(tail.usage.unwrap().total_tokens, 12);
        assert!(parse_chunk("not json").is_err());
    }

    #[test]
    fn request_omits_unset_options() {
        let model = OpenAIChatModel::new("sk-test", "gpt-4o-mini").unwrap();
        let json = serde_json::to_value(model.request("hi", true)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert!(json.get("temperature").is_none());

        let json = serde_json::to_value(model.request("hi", false)).unwrap();
        assert!(json.get("stream_options").is_none());
    }
}
