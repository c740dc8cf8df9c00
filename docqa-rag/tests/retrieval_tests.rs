//! Retrieval and collection management through the pipeline.

mod common;

use std::sync::Arc;

use common::{
    COLLECTION, DIMENSIONS, StallingEmbedder, harness, harness_with, pipeline_with_embedder,
    test_config, text_document,
};
use docqa_rag::{
    ErrorKind, InMemoryVectorStore, MockEmbeddingProvider, MockGenerativeModel, RagConfig,
    RagPipeline, VectorStore,
};

#[tokio::test]
async fn returns_exactly_k_chunks_best_first() {
    let h = harness().await;
    let summary = h.pipeline.ingest(&text_document("handbook", "vacation", 15)).await.unwrap();
    assert!(summary.chunks_created >= 10);

    let result = h.pipeline.retrieve("How many vacation days are there?", 3).await.unwrap();

    assert_eq!(result.len(), 3);
    for pair in result.chunks.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn query_uses_configured_top_k() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("handbook", "vacation", 15)).await.unwrap();

    let result = h.pipeline.query("vacation rules").await.unwrap();

    assert_eq!(result.len(), h.pipeline.config().top_k);
}

#[tokio::test]
async fn k_larger_than_corpus_returns_everything() {
    let h = harness().await;
    let summary = h.pipeline.ingest(&text_document("handbook", "vacation", 3)).await.unwrap();

    let result = h.pipeline.retrieve("vacation", 100).await.unwrap();

    assert_eq!(result.len(), summary.chunks_created);
}

#[tokio::test]
async fn most_relevant_document_ranks_first() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("payroll-guide", "payroll", 6)).await.unwrap();
    h.pipeline.ingest(&text_document("security-guide", "security", 6)).await.unwrap();

    let result = h.pipeline.retrieve("When is payroll processed?", 3).await.unwrap();

    assert!(result.iter().all(|c| c.document_id == "payroll-guide"));
    assert_eq!(result.chunks[0].filename, "payroll-guide.txt");
}

#[tokio::test]
async fn identical_queries_give_identical_results() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("a", "payroll", 6)).await.unwrap();
    h.pipeline.ingest(&text_document("b", "payroll", 6)).await.unwrap();

    let first = h.pipeline.retrieve("payroll", 5).await.unwrap();
    let second = h.pipeline.retrieve("payroll", 5).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn zero_k_is_an_invalid_argument() {
    let h = harness().await;
    let err = h.pipeline.retrieve("anything", 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(h.embedder.calls(), 0);
}

#[tokio::test]
async fn blank_question_is_an_invalid_argument() {
    let h = harness().await;
    let err = h.pipeline.retrieve("   ", 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn empty_corpus_returns_empty_result() {
    let h = harness().await;
    let result = h.pipeline.retrieve("anything at all", 5).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn similarity_threshold_filters_weak_matches() {
    let config = RagConfig { similarity_threshold: Some(0.5), ..test_config() };
    let h = harness_with(config, MockGenerativeModel::new()).await;
    h.pipeline.ingest(&text_document("a", "payroll", 6)).await.unwrap();

    let result = h.pipeline.retrieve("payroll", 50).await.unwrap();
    assert!(result.iter().all(|c| c.score >= 0.5));

    let strict = RagConfig { similarity_threshold: Some(1.5), ..test_config() };
    let h = harness_with(strict, MockGenerativeModel::new()).await;
    h.pipeline.ingest(&text_document("a", "payroll", 6)).await.unwrap();
    assert!(h.pipeline.retrieve("payroll", 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn transient_query_embedding_failure_is_retried() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("a", "payroll", 2)).await.unwrap();
    h.embedder.fail_next(1, true);

    let result = h.pipeline.retrieve("payroll", 1).await.unwrap();

    assert_eq!(result.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_query_embedding_exhausts_retries() {
    let embedder = Arc::new(StallingEmbedder::new(u32::MAX));
    let (pipeline, store) = pipeline_with_embedder(embedder.clone()).await;

    let err = pipeline.retrieve("payroll", 1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmbeddingProviderError);
    assert!(err.is_retriable());
    assert_eq!(embedder.calls(), test_config().retry.max_attempts as usize);
    assert_eq!(store.search_calls(), 0);
}

#[tokio::test]
async fn unreachable_index_fails_the_query() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("a", "payroll", 2)).await.unwrap();
    h.store.fail_searches(1, false);

    let err = h.pipeline.retrieve("payroll", 1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::VectorIndexError);
    assert!(!err.is_retriable());
    assert_eq!(h.store.search_calls(), 1);
}

#[tokio::test]
async fn index_outage_exhausts_retries_instead_of_returning_empty() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("a", "payroll", 2)).await.unwrap();
    h.store.fail_searches(u32::MAX, true);

    let err = h.pipeline.retrieve("payroll", 1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::VectorIndexError);
    assert!(err.is_retriable());
    assert_eq!(h.store.search_calls(), test_config().retry.max_attempts as usize);
}

#[tokio::test]
async fn transient_search_failure_is_retried() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("a", "payroll", 2)).await.unwrap();
    h.store.fail_searches(1, true);

    let result = h.pipeline.retrieve("payroll", 1).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(h.store.search_calls(), 2);
}

#[tokio::test]
async fn delete_collection_empties_the_index() {
    let h = harness().await;
    h.pipeline.ingest(&text_document("a", "payroll", 6)).await.unwrap();
    assert!(h.record_count().await > 0);

    h.pipeline.delete_collection().await.unwrap();

    let info = h.pipeline.collection_info().await.unwrap();
    assert_eq!(info.name, COLLECTION);
    assert_eq!(info.record_count, 0);
    assert_eq!(info.dimensions, DIMENSIONS);
    assert!(h.pipeline.retrieve("payroll", 3).await.unwrap().is_empty());
}

fn pipeline_over(store: Arc<InMemoryVectorStore>, dimensions: usize) -> RagPipeline {
    RagPipeline::builder()
        .config(test_config())
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(dimensions)))
        .vector_store(store)
        .generative_model(Arc::new(MockGenerativeModel::new()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn initialize_creates_the_collection_once() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline_over(store.clone(), DIMENSIONS);

    pipeline.initialize().await.unwrap();
    pipeline.initialize().await.unwrap();

    assert_eq!(store.collection_dimensions(COLLECTION).await.unwrap(), Some(DIMENSIONS));
}

#[tokio::test]
async fn initialize_rejects_a_dimensionality_mismatch() {
    let store = Arc::new(InMemoryVectorStore::new());
    store.create_collection(COLLECTION, 32).await.unwrap();
    let pipeline = pipeline_over(store, DIMENSIONS);

    let err = pipeline.initialize().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}

#[test]
fn builder_requires_every_capability() {
    let err = RagPipeline::builder()
        .config(test_config())
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(8)))
        .generative_model(Arc::new(MockGenerativeModel::new()))
        .build()
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert!(err.to_string().contains("vector_store"));
}

#[test]
fn builder_rejects_invalid_config() {
    let config = RagConfig { chunk_overlap: 500, chunk_size: 100, ..RagConfig::default() };
    let err = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(8)))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generative_model(Arc::new(MockGenerativeModel::new()))
        .build()
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}
