//! Deterministic stand-ins for the external capabilities.
//!
//! [`MockEmbeddingProvider`] and [`MockGenerativeModel`] need no network or
//! model files and always produce the same output for the same input, which
//! makes them suitable for tests, demos, and wiring checks. Both can be told
//! to fail a number of times to exercise retry paths.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::document::TokenUsage;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{Generation, GenerativeModel, TextStream};

/// Scripted failures shared by the mocks.
#[derive(Debug, Default)]
struct FailurePlan {
    remaining: AtomicU32,
    retriable: AtomicBool,
}

impl FailurePlan {
    fn set(&self, times: u32, retriable: bool) {
        self.retriable.store(retriable, Ordering::SeqCst);
        self.remaining.store(times, Ordering::SeqCst);
    }

    /// Consume one planned failure, returning whether it was retriable.
    fn take(&self) -> Option<bool> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| self.retriable.load(Ordering::SeqCst))
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// A hashing bag-of-words embedder.
///
/// Each lowercase alphanumeric word is hashed (FNV-1a) into one of
/// `dimensions` buckets and the vector is L2-normalized, so texts sharing
/// words have positive cosine similarity.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    model: String,
    calls: AtomicUsize,
    failures: FailurePlan,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: "mock-embedding".to_string(),
            calls: AtomicUsize::new(0),
            failures: FailurePlan::default(),
        }
    }

    /// Report a different model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Fail the next `times` calls, transiently or permanently.
    pub fn fail_next(&self, times: u32, retriable: bool) {
        self.failures.set(times, retriable);
    }

    /// Number of `embed_batch` calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word.to_lowercase().bytes().fold(FNV_OFFSET, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME)
            });
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(retriable) = self.failures.take() {
            let message = "injected failure";
            return Err(if retriable {
                RagError::embedding_transient(&self.model, message)
            } else {
                RagError::embedding(&self.model, message)
            });
        }
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A generative model that answers with fixed or echoed text.
///
/// Without a scripted response it replies `Answer to: {question}`, taking
/// the question from the prompt. Streaming yields the same text split after
/// each space.
#[derive(Debug)]
pub struct MockGenerativeModel {
    name: String,
    response: Option<String>,
    failures: FailurePlan,
    calls: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
    last_prompt: Mutex<Option<String>>,
}

impl Default for MockGenerativeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerativeModel {
    pub fn new() -> Self {
        Self {
            name: "mock-model".to_string(),
            response: None,
            failures: FailurePlan::default(),
            calls: AtomicUsize::new(0),
            open_streams: Arc::new(AtomicUsize::new(0)),
            last_prompt: Mutex::new(None),
        }
    }

    /// Always reply with `text`.
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response = Some(text.into());
        self
    }

    /// Fail the next `times` calls, transiently or permanently.
    pub fn fail_next(&self, times: u32, retriable: bool) {
        self.failures.set(times, retriable);
    }

    /// Number of `generate`/`generate_stream` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// The prompt of the most recent call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }

    fn begin(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        if let Some(retriable) = self.failures.take() {
            let message = "injected failure";
            return Err(if retriable {
                RagError::generation_transient(&self.name, message)
            } else {
                RagError::generation(&self.name, message)
            });
        }
        Ok(self.response.clone().unwrap_or_else(|| {
            let question = prompt
                .rsplit_once("Question: ")
                .map(|(_, rest)| rest.trim_end_matches("Answer:").trim())
                .unwrap_or_default();
            format!("Answer to: {question}")
        }))
    }
}

/// Token usage counted in whitespace-separated words.
fn word_usage(prompt: &str, answer: &str) -> TokenUsage {
    let prompt_tokens = prompt.split_whitespace().count() as u32;
    let completion_tokens = answer.split_whitespace().count() as u32;
    TokenUsage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
}

/// Decrements the open-stream count when the stream is dropped.
struct OpenStreamGuard(Arc<AtomicUsize>);

impl OpenStreamGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for OpenStreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerativeModel for MockGenerativeModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let text = self.begin(prompt)?;
        let usage = word_usage(prompt, &text);
        Ok(Generation { text, usage: Some(usage) })
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let text = self.begin(prompt)?;
        let usage = word_usage(prompt, &text);
        let pieces: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let guard = OpenStreamGuard::new(Arc::clone(&self.open_streams));
        let stream = async_stream::stream! {
            let _guard = guard;
            for piece in pieces {
                yield Ok::<_, RagError>(Generation::new(piece));
            }
            yield Ok(Generation { text: String::new(), usage: Some(usage) });
        };
        Ok(Box::pin(stream))
    }
}
