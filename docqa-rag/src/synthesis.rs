//! Grounded answer generation.
//!
//! The [`AnswerSynthesizer`] turns a question plus retrieved chunks into a
//! prompt, calls the [`GenerativeModel`], and attaches source attribution.
//! Answers come back either whole ([`AnswerSynthesizer::answer`]) or as an
//! [`AnswerStream`] of text increments followed by one terminal
//! [`AnswerEvent::Done`].
//!
//! # Streaming and cancellation
//!
//! An [`AnswerStream`] is pull-based: the upstream model stream is only
//! polled when the consumer polls, so increments are never buffered ahead of
//! the reader. Dropping the stream drops the upstream stream with it, which
//! releases the in-flight generation request.

use std::fmt::Write as _;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{Answer, GenerationMetadata, QueryResult, Source};
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;
use crate::retry::with_retry;

/// Instructions placed ahead of every prompt.
pub const INSTRUCTIONS: &str = "You are an assistant that answers questions about the user's \
documents. Answer using only the information in the context below. If the context does not \
contain enough information to answer, say that you don't know. Do not make up facts.";

/// One event of a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// The next piece of answer text.
    Delta(String),
    /// The answer is complete. Always the last event.
    Done {
        /// Empty unless sources were requested.
        sources: Vec<Source>,
        /// Usage is `None` when the model reported none while streaming.
        metadata: GenerationMetadata,
    },
}

/// A lazy, finite, non-restartable stream of [`AnswerEvent`]s.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerEvent>> + Send>>;

/// Either a complete answer or a stream, depending on the `streaming` flag.
pub enum AnswerOutput {
    Complete(Answer),
    Stream(AnswerStream),
}

impl std::fmt::Debug for AnswerOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerOutput::Complete(answer) => f.debug_tuple("Complete").field(answer).finish(),
            AnswerOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Build the grounded prompt for `question` from ranked chunks.
///
/// Each chunk is labelled `[n] filename (chunk i)` in ranked order. With no
/// chunks the context section is left empty and the model is expected to
/// say it does not know.
pub fn build_prompt(question: &str, retrieved: &QueryResult) -> String {
    let context_len: usize = retrieved.iter().map(|c| c.text.len() + 64).sum();
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + question.len() + context_len);
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    for (n, chunk) in retrieved.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] {} (chunk {})", n + 1, chunk.filename, chunk.chunk_index);
        prompt.push_str(&chunk.text);
        prompt.push_str("\n\n");
    }
    let _ = write!(prompt, "\nQuestion: {question}\n\nAnswer:");
    prompt
}

/// Distinct sources in ranked order, one per filename.
pub fn collect_sources(retrieved: &QueryResult) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    for chunk in retrieved.iter() {
        if sources.iter().all(|s| s.filename != chunk.filename) {
            sources.push(Source {
                filename: chunk.filename.clone(),
                chunk_index: chunk.chunk_index,
            });
        }
    }
    sources
}

/// Concatenate a streamed answer into an [`Answer`].
///
/// # Errors
///
/// Returns the first error the stream yields, or
/// [`RagError::GenerationError`] if it ends without a terminal event.
pub async fn collect_answer(mut stream: AnswerStream) -> Result<Answer> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            AnswerEvent::Delta(delta) => text.push_str(&delta),
            AnswerEvent::Done { sources, metadata } => {
                return Ok(Answer { text, sources, metadata });
            }
        }
    }
    Err(RagError::generation("stream", "answer stream ended without completion"))
}

/// Generates grounded answers from retrieved context.
pub struct AnswerSynthesizer {
    config: RagConfig,
    model: Arc<dyn GenerativeModel>,
}

impl AnswerSynthesizer {
    pub fn new(config: RagConfig, model: Arc<dyn GenerativeModel>) -> Self {
        Self { config, model }
    }

    /// Answer whole or streamed, depending on `streaming`.
    pub async fn respond(
        &self,
        question: &str,
        retrieved: &QueryResult,
        streaming: bool,
        include_sources: bool,
    ) -> Result<AnswerOutput> {
        if streaming {
            self.answer_stream(question, retrieved, include_sources).await.map(AnswerOutput::Stream)
        } else {
            self.answer(question, retrieved, include_sources).await.map(AnswerOutput::Complete)
        }
    }

    /// Generate a complete answer.
    ///
    /// An empty `retrieved` set is not an error; the model is still called.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] for non-retriable model failures
    /// immediately, and for transient ones once retries are exhausted.
    pub async fn answer(
        &self,
        question: &str,
        retrieved: &QueryResult,
        include_sources: bool,
    ) -> Result<Answer> {
        let prompt = build_prompt(question, retrieved);
        let prompt = prompt.as_str();
        let model = &self.model;
        let model_name = model.name();
        debug!(model = model_name, context_chunks = retrieved.len(), "generating answer");

        let generation = with_retry(
            &self.config.retry,
            self.config.timeouts.generation(),
            "generate",
            |timeout| {
                RagError::generation_transient(model_name, format!("timed out after {timeout:?}"))
            },
            || model.generate(prompt),
        )
        .await
        .inspect_err(|e| error!(model = model_name, error = %e, "generation failed"))?;

        let sources = if include_sources { collect_sources(retrieved) } else { Vec::new() };
        info!(
            model = model_name,
            answer_len = generation.text.len(),
            source_count = sources.len(),
            "answer generated"
        );

        Ok(Answer {
            text: generation.text,
            sources,
            metadata: GenerationMetadata { model: model_name.to_string(), usage: generation.usage },
        })
    }

    /// Open a streamed answer.
    ///
    /// Opening the upstream stream is retried like [`answer`](Self::answer).
    /// Once increments have started, a failure ends the stream with an error
    /// item. Waiting for each increment is bounded by the generation timeout.
    pub async fn answer_stream(
        &self,
        question: &str,
        retrieved: &QueryResult,
        include_sources: bool,
    ) -> Result<AnswerStream> {
        let prompt = build_prompt(question, retrieved);
        let prompt = prompt.as_str();
        let model = &self.model;
        let model_name = model.name().to_string();
        let timeout = self.config.timeouts.generation();
        debug!(model = %model_name, context_chunks = retrieved.len(), "opening answer stream");

        let mut upstream = with_retry(
            &self.config.retry,
            timeout,
            "generate_stream",
            |timeout| {
                RagError::generation_transient(
                    model_name.as_str(),
                    format!("timed out after {timeout:?}"),
                )
            },
            || model.generate_stream(prompt),
        )
        .await
        .inspect_err(|e| error!(model = %model_name, error = %e, "failed to open answer stream"))?;

        let sources = if include_sources { collect_sources(retrieved) } else { Vec::new() };

        let stream = try_stream! {
            let mut usage = None;
            loop {
                let next = match tokio::time::timeout(timeout, upstream.next()).await {
                    Ok(next) => next,
                    Err(_) => Err(RagError::generation_transient(
                        model_name.as_str(),
                        format!("no increment within {timeout:?}"),
                    ))?,
                };
                match next {
                    Some(increment) => {
                        let increment = increment?;
                        if increment.usage.is_some() {
                            usage = increment.usage;
                        }
                        if !increment.text.is_empty() {
                            yield AnswerEvent::Delta(increment.text);
                        }
                    }
                    None => break,
                }
            }
            debug!(model = %model_name, "answer stream complete");
            yield AnswerEvent::Done {
                sources,
                metadata: GenerationMetadata { model: model_name, usage },
            };
        };

        Ok(Box::pin(stream))
    }
}
