//! Error types for the `docqa-rag` crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Every variant maps to one [`ErrorKind`]. Variants produced by external
/// capabilities (embedding, vector index, generation) carry a `retriable`
/// flag that the retry layer and the caller's boundary use to decide whether
/// the same call may succeed later.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration value is invalid or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A caller-supplied argument is invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The document's content type has no extractor.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Text extraction failed for a supported format.
    #[error("Extraction error ({format}): {message}")]
    ExtractionError {
        /// The content type being extracted.
        format: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retriable: bool,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retriable: bool,
    },

    /// The generative model failed to produce an answer.
    #[error("Generation error ({model}): {message}")]
    GenerationError {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retriable: bool,
    },
}

/// The classification of a [`RagError`], suitable for mapping onto an
/// external status code at the application boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfiguration,
    InvalidArgument,
    UnsupportedFormat,
    ExtractionError,
    EmbeddingProviderError,
    VectorIndexError,
    GenerationError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidConfiguration => "invalid_configuration",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ExtractionError => "extraction_error",
            ErrorKind::EmbeddingProviderError => "embedding_provider_error",
            ErrorKind::VectorIndexError => "vector_index_error",
            ErrorKind::GenerationError => "generation_error",
        };
        f.write_str(name)
    }
}

impl RagError {
    /// Return the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            RagError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RagError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            RagError::ExtractionError { .. } => ErrorKind::ExtractionError,
            RagError::EmbeddingError { .. } => ErrorKind::EmbeddingProviderError,
            RagError::VectorStoreError { .. } => ErrorKind::VectorIndexError,
            RagError::GenerationError { .. } => ErrorKind::GenerationError,
        }
    }

    /// Whether the failed call may succeed if repeated.
    ///
    /// Configuration, argument and format errors are never retriable.
    pub fn is_retriable(&self) -> bool {
        match self {
            RagError::EmbeddingError { retriable, .. }
            | RagError::VectorStoreError { retriable, .. }
            | RagError::GenerationError { retriable, .. } => *retriable,
            _ => false,
        }
    }

    /// A permanent embedding failure (bad request, authentication, malformed response).
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::EmbeddingError {
            provider: provider.into(),
            message: message.into(),
            retriable: false,
        }
    }

    /// A transient embedding failure (timeout, rate limit, server error).
    pub fn embedding_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::EmbeddingError {
            provider: provider.into(),
            message: message.into(),
            retriable: true,
        }
    }

    /// A permanent vector store failure.
    pub fn vector_store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::VectorStoreError {
            backend: backend.into(),
            message: message.into(),
            retriable: false,
        }
    }

    /// A transient vector store failure.
    pub fn vector_store_transient(backend: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::VectorStoreError {
            backend: backend.into(),
            message: message.into(),
            retriable: true,
        }
    }

    /// A permanent generation failure.
    pub fn generation(model: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::GenerationError { model: model.into(), message: message.into(), retriable: false }
    }

    /// A transient generation failure.
    pub fn generation_transient(model: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::GenerationError { model: model.into(), message: message.into(), retriable: true }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
