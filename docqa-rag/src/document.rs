//! Data types for documents, chunks, index records, and answers.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded document awaiting ingestion.
///
/// `content_type` is kept as the label the uploader supplied (a MIME type or
/// a file extension); it is resolved to a [`ContentType`](crate::ContentType)
/// during ingestion so that unknown formats surface as
/// [`RagError::UnsupportedFormat`](crate::RagError::UnsupportedFormat).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Original filename, used as the source label in answers.
    pub filename: String,
    /// Content type label, e.g. `application/pdf`, `text/csv`, `txt`.
    pub content_type: String,
    /// Raw uploaded bytes.
    pub content: Vec<u8>,
    /// When the document was uploaded.
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Create a document from raw bytes, timestamped now.
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            content,
            uploaded_at: Utc::now(),
        }
    }

    /// Create a plain-text document from an in-memory string.
    pub fn from_text(
        id: impl Into<String>,
        filename: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(id, filename, "text/plain", text.into().into_bytes())
    }

    /// Create a document with a freshly generated identifier.
    pub fn with_generated_id(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), filename, content_type, content)
    }
}

/// A contiguous slice of a document's extracted text.
///
/// Offsets count Unicode scalar values, not bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk within its document (0-based).
    pub index: usize,
    /// The chunk text.
    pub text: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
}

impl TextChunk {
    /// Size of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Build the stable record id for a chunk of a document.
pub fn record_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}:{chunk_index}")
}

/// A stored pairing of an embedding with its chunk and source metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    /// Stable identifier, see [`record_id`].
    pub id: String,
    /// The ID of the source [`Document`].
    pub document_id: String,
    /// The source document's filename.
    pub filename: String,
    /// The chunk's position within the document.
    pub chunk_index: usize,
    /// The chunk text.
    pub text: String,
    /// Character offset range of the chunk in the extracted text.
    pub char_range: (usize, usize),
    /// The vector embedding for the chunk text.
    pub embedding: Vec<f32>,
}

impl IndexRecord {
    /// Pair a chunk of `document` with its embedding.
    pub fn new(document: &Document, chunk: TextChunk, embedding: Vec<f32>) -> Self {
        Self {
            id: record_id(&document.id, chunk.index),
            document_id: document.id.clone(),
            filename: document.filename.clone(),
            chunk_index: chunk.index,
            text: chunk.text,
            char_range: (chunk.start, chunk.end),
            embedding,
        }
    }
}

/// A stored [`IndexRecord`] paired with its similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved record.
    pub record: IndexRecord,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Descending score, then ascending `(document_id, chunk_index)`.
pub(crate) fn rank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.record.document_id.cmp(&b.record.document_id))
        .then_with(|| a.record.chunk_index.cmp(&b.record.chunk_index))
}

/// One ranked chunk returned by the retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        let record = result.record;
        Self {
            document_id: record.document_id,
            filename: record.filename,
            chunk_index: record.chunk_index,
            text: record.text,
            score: result.score,
        }
    }
}

/// Chunks ranked by descending similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievedChunk> {
        self.chunks.iter()
    }
}

/// A source cited by an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub filename: String,
    pub chunk_index: usize,
}

/// Token accounting reported by the generative model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Metadata about how an answer was generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationMetadata {
    /// Name of the model that produced the answer.
    pub model: String,
    /// Token usage, when the model reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// A generated answer with its sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Empty unless sources were requested.
    pub sources: Vec<Source>,
    pub metadata: GenerationMetadata,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionSummary {
    pub document_id: String,
    pub chunks_created: usize,
    pub vectors_stored: usize,
}

/// Information about the configured collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub record_count: usize,
    pub dimensions: usize,
}
