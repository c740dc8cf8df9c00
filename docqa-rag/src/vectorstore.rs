//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{IndexRecord, SearchResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`IndexRecord`]s keyed by
/// record id. Upserting a record whose id already exists replaces it
/// wholesale. The similarity metric is fixed when the collection is created.
///
/// Concurrent calls rely on the backend's own consistency guarantees; the
/// pipeline does no locking of its own.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &records).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Return the vector size of an existing collection, or `None` if it does not exist.
    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert records into a collection in one call.
    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()>;

    /// Delete records by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Delete every record of `document_id` whose chunk index is at least `from_chunk_index`.
    async fn delete_document_chunks(
        &self,
        collection: &str,
        document_id: &str,
        from_chunk_index: usize,
    ) -> Result<()>;

    /// Remove every record from a collection, keeping the collection itself.
    async fn delete_all(&self, collection: &str) -> Result<()>;

    /// Search for the `top_k` most similar records to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Return the number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}
