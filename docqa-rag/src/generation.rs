//! Generative model trait used by the answer synthesizer.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::document::TokenUsage;
use crate::error::Result;

/// A lazy, finite stream of increments from a generative model.
///
/// Each item carries the next piece of text. A backend that reports token
/// usage sets `usage` on one item, usually a final one with empty text.
/// Dropping the stream must release the underlying request.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<Generation>> + Send>>;

/// A complete generation, or one increment of a streamed one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), usage: None }
    }
}

/// A model that turns a prompt into text.
///
/// Transient failures (timeouts, 5xx, rate limits) should be reported with
/// [`RagError::generation_transient`](crate::RagError::generation_transient);
/// invalid requests and authentication failures with
/// [`RagError::generation`](crate::RagError::generation).
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// The model identifier reported in answer metadata.
    fn name(&self) -> &str;

    /// Generate a full response for the prompt.
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// Open a streaming response for the prompt.
    ///
    /// Errors returned here happen before any increment was produced.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;
}
