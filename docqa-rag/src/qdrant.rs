//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! Record ids such as `report-1:3` are not valid Qdrant point ids, so each
//! point id is the UUIDv5 of the record id. The record id itself is
//! recomputed from the payload on the way back.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.create_collection("docs", 384).await?;
//! store.upsert("docs", &records).await?;
//! let results = store.search("docs", &query_embedding, 5).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, PointId, PointStruct, PointsIdsList, Range, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::document::{IndexRecord, SearchResult, record_id};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Wraps a [`qdrant_client::Qdrant`] client and maps collections to Qdrant
/// collections with cosine distance. Record metadata is stored as payload.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(|e| {
            RagError::InvalidConfiguration(format!("invalid qdrant url '{url}': {e}"))
        })?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store with default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    /// Unavailable, deadline and throttling statuses are worth retrying.
    fn map_err(e: QdrantError) -> RagError {
        let retriable = match &e {
            QdrantError::ResponseError { status } => matches!(
                status.code(),
                tonic::Code::Unavailable
                    | tonic::Code::DeadlineExceeded
                    | tonic::Code::ResourceExhausted
                    | tonic::Code::Aborted
            ),
            _ => false,
        };
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: e.to_string(),
            retriable,
        }
    }

    fn point_id(record_id: &str) -> PointId {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string().into()
    }

    fn payload(record: &IndexRecord) -> Result<Payload> {
        Payload::try_from(json!({
            "text": record.text,
            "document_id": record.document_id,
            "filename": record.filename,
            "chunk_index": record.chunk_index,
            "start": record.char_range.0,
            "end": record.char_range.1,
        }))
        .map_err(Self::map_err)
    }

    fn string_field(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn usize_field(value: &QdrantValue) -> Option<usize> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => usize::try_from(*n).ok(),
            Some(Kind::DoubleValue(n)) if *n >= 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    fn document_filter(document_id: &str) -> Condition {
        Condition::matches("document_id", document_id.to_string())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.client.collection_exists(name).await.map_err(Self::map_err)? {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>> {
        if !self.client.collection_exists(name).await.map_err(Self::map_err)? {
            return Ok(None);
        }
        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|config| match config {
                VectorsConfigKind::Params(params) => Some(params.size as usize),
                VectorsConfigKind::ParamsMap(_) => None,
            });
        size.map(Some).ok_or_else(|| {
            RagError::vector_store(
                BACKEND,
                format!("collection '{name}' does not use a single unnamed vector"),
            )
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                Ok(PointStruct::new(
                    Self::point_id(&record.id),
                    record.embedding.clone(),
                    Self::payload(record)?,
                ))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = records.len(), "upserted records to qdrant");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| Self::point_id(id)).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = ids.len(), "deleted points from qdrant");
        Ok(())
    }

    async fn delete_document_chunks(
        &self,
        collection: &str,
        document_id: &str,
        from_chunk_index: usize,
    ) -> Result<()> {
        let mut conditions = vec![Self::document_filter(document_id)];
        if from_chunk_index > 0 {
            conditions.push(Condition::range(
                "chunk_index",
                Range { gte: Some(from_chunk_index as f64), ..Default::default() },
            ));
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection).points(Filter::must(conditions)).wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(
            collection,
            document.id = document_id,
            from_chunk_index,
            "deleted document points"
        );
        Ok(())
    }

    async fn delete_all(&self, collection: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection).points(Filter::default()).wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, "deleted all points from qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let payload = &scored.payload;
                let text = payload.get("text").and_then(Self::string_field).unwrap_or_default();
                let document_id =
                    payload.get("document_id").and_then(Self::string_field).unwrap_or_default();
                let filename =
                    payload.get("filename").and_then(Self::string_field).unwrap_or_default();
                let chunk_index =
                    payload.get("chunk_index").and_then(Self::usize_field).unwrap_or_default();
                let start = payload.get("start").and_then(Self::usize_field).unwrap_or_default();
                let end = payload.get("end").and_then(Self::usize_field).unwrap_or_default();

                SearchResult {
                    record: IndexRecord {
                        id: record_id(&document_id, chunk_index),
                        document_id,
                        filename,
                        chunk_index,
                        text,
                        char_range: (start, end),
                        embedding: Vec::new(),
                    },
                    score: scored.score,
                }
            })
            .collect();

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or_default())
    }
}
