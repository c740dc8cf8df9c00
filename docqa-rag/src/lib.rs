//! # docqa-rag
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! ## Overview
//!
//! Documents (PDF, plain text, CSV) are extracted to text, split into
//! overlapping chunks, embedded, and stored in a vector index. Questions are
//! embedded with the same model, the nearest chunks are retrieved, and a
//! generative model answers from those chunks only, citing the files they
//! came from. Answers can be returned whole or streamed.
//!
//! The embedding model, the vector index and the generative model are
//! traits, so any backend can be plugged in:
//!
//! - [`EmbeddingProvider`] - text to vectors
//! - [`VectorStore`] - storage and similarity search
//! - [`GenerativeModel`] - prompt to text, whole or streamed
//! - [`TextExtractor`] - raw bytes to text
//! - [`Chunker`] - text to chunks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{
//!     Document, InMemoryVectorStore, MockEmbeddingProvider, MockGenerativeModel, RagConfig,
//!     RagPipeline,
//! };
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::new(64)))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generative_model(Arc::new(MockGenerativeModel::new()))
//!     .build()?;
//!
//! pipeline.initialize().await?;
//! pipeline.ingest(&Document::from_text("handbook", "handbook.txt", text)).await?;
//! let answer = pipeline.ask("How many vacation days do I get?", true).await?;
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `pdf` (default) | PDF text extraction via `pdf-extract` |
//! | `openai` | [`openai::OpenAIEmbeddingProvider`] and [`openai::OpenAIChatModel`] |
//! | `qdrant` | [`qdrant::QdrantVectorStore`] |
//! | `full` | All of the above |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod inmemory;
pub mod mock;
pub mod pipeline;
pub mod retrieval;
mod retry;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, FixedSizeChunker, split};
pub use config::{RagConfig, RagConfigBuilder, RetryConfig, TimeoutConfig};
pub use document::{
    Answer, CollectionInfo, Document, GenerationMetadata, IndexRecord, IngestionSummary,
    QueryResult, RetrievedChunk, SearchResult, Source, TextChunk, TokenUsage, record_id,
};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, RagError, Result};
pub use extract::{ContentType, DefaultTextExtractor, TextExtractor};
pub use generation::{Generation, GenerativeModel, TextStream};
pub use ingest::Ingestor;
pub use inmemory::InMemoryVectorStore;
pub use mock::{MockEmbeddingProvider, MockGenerativeModel};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retrieval::Retriever;
pub use synthesis::{
    AnswerEvent, AnswerOutput, AnswerStream, AnswerSynthesizer, build_prompt, collect_answer,
};
pub use vectorstore::VectorStore;
