//! OpenAI-backed embedding provider and chat model.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! clients talk to the REST API directly with `reqwest` and work with any
//! OpenAI-compatible server via `with_base_url`.
//!
//! Failed calls are classified for the retry layer: network errors, timeouts,
//! `408`, `429` and `5xx` responses are transient; every other `4xx` is
//! permanent.

mod chat;
mod embedding;

pub use chat::OpenAIChatModel;
pub use embedding::OpenAIEmbeddingProvider;

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// The default OpenAI REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A failed API call, before it is attributed to a provider or model.
#[derive(Debug)]
pub(crate) struct ApiFailure {
    pub retriable: bool,
    pub message: String,
}

impl ApiFailure {
    fn from_status(status: StatusCode, detail: String) -> Self {
        let retriable = status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error();
        Self { retriable, message: format!("API returned {status}: {detail}") }
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(e: reqwest::Error) -> Self {
        let retriable = e.is_timeout() || e.is_connect() || e.is_request() || e.is_body();
        Self { retriable, message: format!("request failed: {e}") }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into an [`ApiFailure`], reading the API's
/// error message from the body when there is one.
pub(crate) async fn check_response(response: Response) -> Result<Response, ApiFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    Err(ApiFailure::from_status(status, detail))
}

/// An HTTP client with a bounded connect time.
///
/// No total request timeout is set: the pipeline bounds each call itself,
/// and a total timeout would cut long answer streams short.
pub(crate) fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(ApiFailure::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()).retriable);
        assert!(ApiFailure::from_status(StatusCode::BAD_GATEWAY, String::new()).retriable);
        assert!(ApiFailure::from_status(StatusCode::REQUEST_TIMEOUT, String::new()).retriable);
        assert!(!ApiFailure::from_status(StatusCode::UNAUTHORIZED, String::new()).retriable);
        assert!(!ApiFailure::from_status(StatusCode::BAD_REQUEST, String::new()).retriable);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:8080/v1/", "embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            endpoint(DEFAULT_BASE_URL, "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
