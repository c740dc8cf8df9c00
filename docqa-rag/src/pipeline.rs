//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] wires an [`Ingestor`], a [`Retriever`], and an
//! [`AnswerSynthesizer`] from one [`RagConfig`] and exposes the operations
//! callers use: ingest, retrieve, answer, and collection management.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{Document, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generative_model(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.initialize().await?;
//! pipeline.ingest(&Document::from_text("faq", "faq.txt", text)).await?;
//! let answer = pipeline.ask("How do I reset my password?", true).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Answer, CollectionInfo, Document, IngestionSummary, QueryResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{DefaultTextExtractor, TextExtractor};
use crate::generation::GenerativeModel;
use crate::ingest::{INDEX, Ingestor};
use crate::retrieval::Retriever;
use crate::retry::with_retry;
use crate::synthesis::{AnswerOutput, AnswerStream, AnswerSynthesizer};
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (extract → chunk → embed → store), query
/// execution (embed → search → rank) and answer synthesis. Construct one via
/// [`RagPipeline::builder()`] and call [`initialize`](Self::initialize)
/// before first use.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    ingestor: Ingestor,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Prepare the configured collection.
    ///
    /// Creates the collection with the embedding provider's dimensionality
    /// if it does not exist. If it exists with a different dimensionality,
    /// startup fails: vectors from two models cannot share a collection.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfiguration`] on a dimensionality mismatch
    /// - [`RagError::VectorStoreError`] if the store is unreachable
    pub async fn initialize(&self) -> Result<()> {
        let name = self.config.collection_name.as_str();
        let dimensions = self.embedding_provider.dimensions();
        let store = &self.vector_store;

        let existing =
            self.index_call("collection_dimensions", || store.collection_dimensions(name)).await?;
        match existing {
            Some(existing) if existing != dimensions => {
                error!(
                    collection = name,
                    existing,
                    dimensions,
                    "embedding dimensionality mismatch"
                );
                Err(RagError::InvalidConfiguration(format!(
                    "collection '{name}' stores {existing}-dimensional vectors but embedding model \
                     '{}' produces {dimensions}",
                    self.embedding_provider.model_name()
                )))
            }
            Some(_) => {
                info!(collection = name, dimensions, "using existing collection");
                Ok(())
            }
            None => {
                self.index_call("create_collection", || store.create_collection(name, dimensions))
                    .await?;
                info!(collection = name, dimensions, "created collection");
                Ok(())
            }
        }
    }

    /// Ingest a single document. See [`Ingestor::ingest`].
    pub async fn ingest(&self, document: &Document) -> Result<IngestionSummary> {
        self.ingestor.ingest(document).await
    }

    /// Ingest several documents, stopping at the first failure.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<IngestionSummary>> {
        self.ingestor.ingest_batch(documents).await
    }

    /// Retrieve at most `k` chunks for `question`. See [`Retriever::retrieve`].
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<QueryResult> {
        self.retriever.retrieve(question, k).await
    }

    /// Retrieve with the configured `top_k`.
    pub async fn query(&self, question: &str) -> Result<QueryResult> {
        self.retriever.retrieve(question, self.config.top_k).await
    }

    /// Answer `question` from `retrieved`, whole or streamed.
    pub async fn answer(
        &self,
        question: &str,
        retrieved: &QueryResult,
        streaming: bool,
        include_sources: bool,
    ) -> Result<AnswerOutput> {
        self.synthesizer.respond(question, retrieved, streaming, include_sources).await
    }

    /// Answer `question` from `retrieved` in one piece.
    pub async fn answer_text(
        &self,
        question: &str,
        retrieved: &QueryResult,
        include_sources: bool,
    ) -> Result<Answer> {
        self.synthesizer.answer(question, retrieved, include_sources).await
    }

    /// Answer `question` from `retrieved` as a stream of increments.
    pub async fn answer_stream(
        &self,
        question: &str,
        retrieved: &QueryResult,
        include_sources: bool,
    ) -> Result<AnswerStream> {
        self.synthesizer.answer_stream(question, retrieved, include_sources).await
    }

    /// Retrieve with the configured `top_k`, then answer.
    pub async fn ask(&self, question: &str, include_sources: bool) -> Result<Answer> {
        let retrieved = self.query(question).await?;
        self.synthesizer.answer(question, &retrieved, include_sources).await
    }

    /// Report the configured collection's record count and dimensionality.
    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        let name = self.config.collection_name.as_str();
        let store = &self.vector_store;
        let record_count = self.index_call("count", || store.count(name)).await?;
        Ok(CollectionInfo {
            name: name.to_string(),
            record_count,
            dimensions: self.embedding_provider.dimensions(),
        })
    }

    /// Remove every record from the configured collection.
    ///
    /// The collection itself is kept, so retrieval afterwards returns an
    /// empty result instead of failing.
    pub async fn delete_collection(&self) -> Result<()> {
        let name = self.config.collection_name.as_str();
        let store = &self.vector_store;
        self.index_call("delete_all", || store.delete_all(name)).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
        })?;
        info!(collection = name, "deleted all records");
        Ok(())
    }

    /// Remove every record of one document.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.ingestor.delete_document(document_id).await
    }

    async fn index_call<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let collection = self.config.collection_name.as_str();
        with_retry(
            &self.config.retry,
            self.config.timeouts.vector_index(),
            operation,
            |timeout| {
                RagError::vector_store_transient(
                    INDEX,
                    format!("{operation} on '{collection}' timed out after {timeout:?}"),
                )
            },
            call,
        )
        .await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, `vector_store` and `generative_model` are
/// required. The extractor defaults to [`DefaultTextExtractor`] and the
/// chunker to a [`FixedSizeChunker`] built from the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .generative_model(Arc::new(model))
///     .extractor(Arc::new(my_extractor))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    generative_model: Option<Arc<dyn GenerativeModel>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the generative model used for answers.
    pub fn generative_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.generative_model = Some(model);
        self
    }

    /// Replace the default text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if any required field is
    /// missing or the config is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self
            .config
            .ok_or_else(|| RagError::InvalidConfiguration("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::InvalidConfiguration("vector_store is required".to_string()))?;
        let generative_model = self.generative_model.ok_or_else(|| {
            RagError::InvalidConfiguration("generative_model is required".to_string())
        })?;
        let extractor = self.extractor.unwrap_or_else(|| Arc::new(DefaultTextExtractor));
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(
                FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?
                    .with_boundary_window(config.boundary_window),
            ),
        };

        if embedding_provider.model_name() != config.embedding_model {
            warn!(
                configured = %config.embedding_model,
                provider = embedding_provider.model_name(),
                "embedding provider model differs from configured embedding_model"
            );
        }
        if generative_model.name() != config.generation_model {
            warn!(
                configured = %config.generation_model,
                model = generative_model.name(),
                "generative model differs from configured generation_model"
            );
        }

        let ingestor = Ingestor::new(
            config.clone(),
            extractor,
            chunker,
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store),
        );
        let retriever = Retriever::new(
            config.clone(),
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store),
        );
        let synthesizer = AnswerSynthesizer::new(config.clone(), generative_model);

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            ingestor,
            retriever,
            synthesizer,
        })
    }
}
