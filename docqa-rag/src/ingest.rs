//! Document ingestion: extract → chunk → embed → store.
//!
//! The [`Ingestor`] is the only component that writes to the vector store.
//! Nothing is written until every chunk of a document has been embedded, and
//! all of a document's records are upserted in a single call. If a write
//! fails after the store may have changed, every record of the document is
//! removed, so a failed ingestion leaves the document absent rather than
//! half-written.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Document, IndexRecord, IngestionSummary, TextChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{ContentType, TextExtractor};
use crate::retry::with_retry;
use crate::vectorstore::VectorStore;

/// Label for errors raised by the pipeline itself rather than a backend.
pub(crate) const INDEX: &str = "vector index";

/// Writes documents into the vector store.
pub struct Ingestor {
    config: RagConfig,
    extractor: Arc<dyn TextExtractor>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl Ingestor {
    pub fn new(
        config: RagConfig,
        extractor: Arc<dyn TextExtractor>,
        chunker: Arc<dyn Chunker>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { config, extractor, chunker, embedding_provider, vector_store }
    }

    /// Ingest a single document.
    ///
    /// Re-ingesting a document with the same id overwrites its records and
    /// removes any left over from a longer previous version. A document that
    /// yields no text is not an error; the summary reports zero counts.
    ///
    /// # Errors
    ///
    /// - [`RagError::UnsupportedFormat`] for an unknown content type
    /// - [`RagError::ExtractionError`] if the bytes cannot be parsed
    /// - [`RagError::EmbeddingError`] once embedding retries are exhausted
    /// - [`RagError::VectorStoreError`] once upsert retries are exhausted
    pub async fn ingest(&self, document: &Document) -> Result<IngestionSummary> {
        let content_type: ContentType = document.content_type.parse()?;

        // 1. Extract text
        let text = self.extract(document, content_type).await?;

        // 2. Chunk
        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            self.remove_stale(&document.id, 0).await?;
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestionSummary {
                document_id: document.id.clone(),
                chunks_created: 0,
                vectors_stored: 0,
            });
        }
        let chunks_created = chunks.len();

        // 3. Embed every chunk before touching the store
        let embeddings = self.embed_chunks(document, &chunks).await?;

        // 4. Upsert all records in one call
        let records: Vec<IndexRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexRecord::new(document, chunk, embedding))
            .collect();
        if let Err(e) = self.store(document, &records).await {
            self.discard(&document.id).await;
            return Err(e);
        }

        // 5. Drop records from a previous, longer version of this document
        if let Err(e) = self.remove_stale(&document.id, records.len()).await {
            self.discard(&document.id).await;
            return Err(e);
        }

        let vectors_stored = records.len();
        info!(
            document.id = %document.id,
            filename = %document.filename,
            %content_type,
            chunk_count = chunks_created,
            "ingested document"
        );

        Ok(IngestionSummary { document_id: document.id.clone(), chunks_created, vectors_stored })
    }

    /// Ingest documents one after another, stopping at the first failure.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<IngestionSummary>> {
        let mut summaries = Vec::with_capacity(documents.len());
        for document in documents {
            summaries.push(self.ingest(document).await?);
        }
        Ok(summaries)
    }

    /// Remove every record belonging to `document_id`.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.remove_stale(document_id, 0).await?;
        info!(document.id = %document_id, "deleted document");
        Ok(())
    }

    async fn extract(&self, document: &Document, content_type: ContentType) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let raw = document.content.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&raw, content_type))
            .await
            .map_err(|e| RagError::ExtractionError {
                format: content_type.to_string(),
                message: format!("extraction task failed: {e}"),
            })?
            .inspect_err(|e| {
                error!(document.id = %document.id, error = %e, "text extraction failed");
            })?;
        debug!(document.id = %document.id, text_len = text.len(), "extracted text");
        Ok(text)
    }

    /// Embed chunks in sequential batches of `embed_batch_size`.
    async fn embed_chunks(
        &self,
        document: &Document,
        chunks: &[TextChunk],
    ) -> Result<Vec<Vec<f32>>> {
        let provider = &self.embedding_provider;
        let provider_name = provider.model_name();
        let dimensions = provider.dimensions();
        let mut embeddings = Vec::with_capacity(chunks.len());

        for (batch_index, batch) in chunks.chunks(self.config.embed_batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let texts = &texts;
            debug!(
                document.id = %document.id,
                batch_index,
                batch_size = texts.len(),
                "embedding batch"
            );

            let vectors = with_retry(
                &self.config.retry,
                self.config.timeouts.embedding(),
                "embed_batch",
                |timeout| {
                    RagError::embedding_transient(
                        provider_name,
                        format!("timed out after {timeout:?}"),
                    )
                },
                || provider.embed_batch(texts),
            )
            .await
            .inspect_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            })?;

            if vectors.len() != texts.len() {
                return Err(RagError::embedding(
                    provider_name,
                    format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
                ));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
                return Err(RagError::embedding(
                    provider_name,
                    format!("expected {dimensions}-dimensional embeddings, got {}", bad.len()),
                ));
            }
            if vectors.iter().flatten().any(|x| !x.is_finite()) {
                return Err(RagError::embedding(
                    provider_name,
                    "embedding contains NaN or infinite components",
                ));
            }
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    async fn store(&self, document: &Document, records: &[IndexRecord]) -> Result<()> {
        let collection = self.config.collection_name.as_str();
        let store = &self.vector_store;
        with_retry(
            &self.config.retry,
            self.config.timeouts.vector_index(),
            "upsert",
            |timeout| {
                RagError::vector_store_transient(
                    INDEX,
                    format!("upsert into '{collection}' timed out after {timeout:?}"),
                )
            },
            || store.upsert(collection, records),
        )
        .await
        .inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
        })
    }

    /// Best-effort removal of every record of a document after a failed write.
    async fn discard(&self, document_id: &str) {
        let collection = self.config.collection_name.as_str();
        let timeout = self.config.timeouts.vector_index();
        let cleanup = tokio::time::timeout(
            timeout,
            self.vector_store.delete_document_chunks(collection, document_id, 0),
        )
        .await;
        if matches!(cleanup, Ok(Ok(()))) {
            warn!(document.id = %document_id, "removed document after failed ingestion");
        } else {
            warn!(
                document.id = %document_id,
                "could not remove document after failed ingestion; re-run ingest to repair"
            );
        }
    }

    async fn remove_stale(&self, document_id: &str, from_chunk_index: usize) -> Result<()> {
        let collection = self.config.collection_name.as_str();
        let store = &self.vector_store;
        with_retry(
            &self.config.retry,
            self.config.timeouts.vector_index(),
            "delete_document_chunks",
            |timeout| {
                RagError::vector_store_transient(
                    INDEX,
                    format!("delete from '{collection}' timed out after {timeout:?}"),
                )
            },
            || store.delete_document_chunks(collection, document_id, from_chunk_index),
        )
        .await
        .inspect_err(|e| {
            error!(document.id = %document_id, error = %e, "failed to remove stale records");
        })
    }
}
