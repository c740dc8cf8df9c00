//! Shared fixtures for the pipeline tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_rag::{
    Document, EmbeddingProvider, IndexRecord, InMemoryVectorStore, MockEmbeddingProvider,
    MockGenerativeModel, RagConfig, RagError, RagPipeline, Result, RetryConfig, SearchResult,
    TimeoutConfig, VectorStore,
};

pub const DIMENSIONS: usize = 256;
pub const COLLECTION: &str = "test-docs";

/// Small chunks and near-instant backoff.
pub fn test_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(200)
        .chunk_overlap(40)
        .embedding_model("mock-embedding")
        .generation_model("mock-model")
        .collection_name(COLLECTION)
        .top_k(4)
        .embed_batch_size(4)
        .retry(RetryConfig { max_attempts: 3, initial_backoff_ms: 1, max_backoff_ms: 4 })
        .timeouts(TimeoutConfig {
            embedding_ms: 2_000,
            vector_index_ms: 2_000,
            generation_ms: 2_000,
        })
        .build()
        .unwrap()
}

pub struct Harness {
    pub pipeline: RagPipeline,
    pub embedder: Arc<MockEmbeddingProvider>,
    pub model: Arc<MockGenerativeModel>,
    pub store: Arc<FlakyStore>,
}

pub async fn harness() -> Harness {
    harness_with(test_config(), MockGenerativeModel::new()).await
}

pub async fn harness_with(config: RagConfig, model: MockGenerativeModel) -> Harness {
    let embedder = Arc::new(MockEmbeddingProvider::new(DIMENSIONS));
    let model = Arc::new(model);
    let store = Arc::new(FlakyStore::default());
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .generative_model(model.clone())
        .build()
        .unwrap();
    pipeline.initialize().await.unwrap();
    Harness { pipeline, embedder, model, store }
}

/// A pipeline over a custom embedding provider and a fresh [`FlakyStore`].
pub async fn pipeline_with_embedder(
    embedder: Arc<dyn EmbeddingProvider>,
) -> (RagPipeline, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let pipeline = RagPipeline::builder()
        .config(test_config())
        .embedding_provider(embedder)
        .vector_store(store.clone())
        .generative_model(Arc::new(MockGenerativeModel::new()))
        .build()
        .unwrap();
    pipeline.initialize().await.unwrap();
    (pipeline, store)
}

impl Harness {
    pub async fn record_count(&self) -> usize {
        self.pipeline.collection_info().await.unwrap().record_count
    }
}

/// A few paragraphs about one topic, long enough for several chunks.
pub fn topic_text(topic: &str, paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {i} about {topic}. The {topic} section explains how {topic} works \
                 in practice and lists the {topic} rules that apply to everyone."
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn text_document(id: &str, topic: &str, paragraphs: usize) -> Document {
    Document::from_text(id, format!("{id}.txt"), topic_text(topic, paragraphs))
}

/// Embeds like [`MockEmbeddingProvider`], but the first calls never return.
pub struct StallingEmbedder {
    inner: MockEmbeddingProvider,
    stalls: AtomicU32,
    calls: AtomicUsize,
}

impl StallingEmbedder {
    pub fn new(stalls: u32) -> Self {
        Self {
            inner: MockEmbeddingProvider::new(DIMENSIONS),
            stalls: AtomicU32::new(stalls),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StallingEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.stalls) {
            std::future::pending::<()>().await;
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "stalling-embedding"
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

fn injected(retriable: bool, message: &str) -> RagError {
    if retriable {
        RagError::vector_store_transient("flaky", message)
    } else {
        RagError::vector_store("flaky", message)
    }
}

/// An in-memory store whose upserts, searches and trims can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryVectorStore,
    failing_upserts: AtomicU32,
    failing_searches: AtomicU32,
    failing_trims: AtomicU32,
    retriable: AtomicBool,
    upsert_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_upserts(&self, times: u32, retriable: bool) {
        self.retriable.store(retriable, Ordering::SeqCst);
        self.failing_upserts.store(times, Ordering::SeqCst);
    }

    pub fn fail_searches(&self, times: u32, retriable: bool) {
        self.retriable.store(retriable, Ordering::SeqCst);
        self.failing_searches.store(times, Ordering::SeqCst);
    }

    /// Fail removals of trailing chunks. Whole-document deletes still work.
    pub fn fail_trims(&self, times: u32) {
        self.retriable.store(false, Ordering::SeqCst);
        self.failing_trims.store(times, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Chunk indices stored for one document, ascending.
    pub async fn chunk_indices(&self, collection: &str, document_id: &str) -> Vec<usize> {
        let query = vec![1.0; DIMENSIONS];
        let mut indices: Vec<usize> = self
            .inner
            .search(collection, &query, usize::MAX)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.record.document_id == document_id)
            .map(|r| r.record.chunk_index)
            .collect();
        indices.sort_unstable();
        indices
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>> {
        self.inner.collection_dimensions(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_upserts) {
            // Apply half the batch before failing, like a backend that died mid-write.
            let half = records.len() / 2;
            self.inner.upsert(collection, &records[..half]).await?;
            return Err(injected(self.retriable.load(Ordering::SeqCst), "connection reset"));
        }
        self.inner.upsert(collection, records).await
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.inner.delete(collection, ids).await
    }

    async fn delete_document_chunks(
        &self,
        collection: &str,
        document_id: &str,
        from_chunk_index: usize,
    ) -> Result<()> {
        if from_chunk_index > 0 && take_one(&self.failing_trims) {
            return Err(injected(false, "delete rejected"));
        }
        self.inner.delete_document_chunks(collection, document_id, from_chunk_index).await
    }

    async fn delete_all(&self, collection: &str) -> Result<()> {
        self.inner.delete_all(collection).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_searches) {
            return Err(injected(self.retriable.load(Ordering::SeqCst), "unavailable"));
        }
        self.inner.search(collection, embedding, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }
}
