//! Query-time retrieval: embed → search → rank → filter.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{QueryResult, RetrievedChunk, SearchResult, rank_order};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::ingest::INDEX;
use crate::retry::with_retry;
use crate::vectorstore::VectorStore;

/// Finds the chunks most similar to a question. Read-only against the store.
///
/// The embedding provider must be the same model that embedded the stored
/// chunks, and the store's metric is whatever the collection was created
/// with. [`RagPipeline::initialize`](crate::RagPipeline::initialize) checks
/// the dimensionality once; it is not re-checked per query.
pub struct Retriever {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { config, embedding_provider, vector_store }
    }

    /// Retrieve at most `k` chunks for `question`, best first.
    ///
    /// Ties in score are broken by ascending `(document_id, chunk_index)`, so
    /// identical inputs always produce identical output. An empty collection
    /// yields an empty result.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `k == 0` or the question is blank
    /// - [`RagError::EmbeddingError`] if the question cannot be embedded
    /// - [`RagError::VectorStoreError`] if the store cannot be searched
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be greater than zero".to_string()));
        }
        if question.trim().is_empty() {
            return Err(RagError::InvalidArgument("question must not be empty".to_string()));
        }

        // 1. Embed the question
        let provider = &self.embedding_provider;
        let provider_name = provider.model_name();
        let query_embedding = with_retry(
            &self.config.retry,
            self.config.timeouts.embedding(),
            "embed_query",
            |timeout| {
                RagError::embedding_transient(provider_name, format!("timed out after {timeout:?}"))
            },
            || provider.embed(question),
        )
        .await
        .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;
        if query_embedding.iter().any(|x| !x.is_finite()) {
            return Err(RagError::embedding(
                provider_name,
                "query embedding contains NaN or infinite components",
            ));
        }

        // 2. Search the vector store
        let collection = self.config.collection_name.as_str();
        let store = &self.vector_store;
        let query_embedding = &query_embedding;
        let mut results: Vec<SearchResult> = with_retry(
            &self.config.retry,
            self.config.timeouts.vector_index(),
            "search",
            |timeout| {
                RagError::vector_store_transient(
                    INDEX,
                    format!("search in '{collection}' timed out after {timeout:?}"),
                )
            },
            || store.search(collection, query_embedding, k),
        )
        .await
        .inspect_err(|e| error!(collection, error = %e, "vector store search failed"))?;
        debug!(collection, candidate_count = results.len(), "search returned");

        // 3. Deterministic order, whatever the backend did with ties
        results.sort_by(rank_order);
        results.truncate(k);

        // 4. Filter by similarity threshold
        let threshold = self.config.similarity_threshold;
        let chunks: Vec<RetrievedChunk> = results
            .into_iter()
            .filter(|r| threshold.is_none_or(|min| r.score >= min))
            .map(RetrievedChunk::from)
            .collect();

        info!(result_count = chunks.len(), k, "query completed");

        Ok(QueryResult { chunks })
    }
}
