//! Vector Store Writer: embed page records and upsert them into Qdrant.
//!
//! The batch driver depends only on [`VectorStoreWriter`]. The client is
//! built once per run and passed in explicitly.
//!
//! Point ids are UUIDv5 over `"{document_key}#{page}"`, where the key is the
//! PDF's path relative to the ingestion root: re-ingesting an unchanged book
//! overwrites its points, and same-named books in different folders never
//! collide.

use crate::config::IngestConfig;
use crate::error::{IngestError, WriteError};
use crate::output::PageRecord;
use async_trait::async_trait;
use edgequake_llm::{EmbeddingProvider, ProviderFactory};
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance,
    FieldType, PointId, PointStruct, UpsertPointsBuilder, VectorParamsBuilder, VectorsConfig,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Persists a batch of records, embedding them internally.
///
/// There is no transaction across a batch: on `Err`, some records may
/// already be stored.
#[async_trait]
pub trait VectorStoreWriter: Send + Sync {
    /// Returns the number of records written.
    async fn write_batch(&self, records: &[PageRecord]) -> Result<usize, WriteError>;
}

/// Stable identity of a page across runs.
pub fn document_id(document_key: &str, page_number: usize) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{document_key}#{page_number}").as_bytes(),
    )
}

/// Payload stored next to the vector.
pub fn payload(record: &PageRecord) -> HashMap<String, Value> {
    let meta = record.metadata();
    HashMap::from([
        ("text".to_string(), Value::String(record.content().to_string())),
        ("source".to_string(), Value::String(meta.source)),
        (
            "source_path".to_string(),
            Value::String(record.document_key().to_string()),
        ),
        ("page".to_string(), Value::from(meta.page)),
        ("type".to_string(), Value::String(meta.record_type)),
        (
            "processing_mode".to_string(),
            Value::String(meta.processing_mode.as_str().to_string()),
        ),
        ("has_overlap".to_string(), Value::Bool(meta.has_overlap)),
        ("processed_at".to_string(), Value::String(meta.processed_at)),
    ])
}

/// [`VectorStoreWriter`] backed by Qdrant and an `edgequake-llm` embedder.
pub struct QdrantWriter {
    client: Arc<Qdrant>,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl QdrantWriter {
    pub fn new(
        client: Arc<Qdrant>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            collection: collection.into(),
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Connect using `qdrant_url` / `qdrant_api_key` and the embedding
    /// provider auto-detected from the environment.
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        let url = config
            .qdrant_url
            .as_deref()
            .ok_or_else(|| IngestError::StoreNotConfigured("QDRANT_URL is not set".to_string()))?;

        let client = Qdrant::from_url(url)
            .api_key(config.qdrant_api_key.clone())
            .build()
            .map_err(|e| IngestError::StoreConnectionFailed(e.to_string()))?;

        let (_llm, embedder) =
            ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
                provider: "embedding".to_string(),
                hint: format!(
                    "No embedding provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY or another supported provider key.\n\
                    Error: {}",
                    e
                ),
            })?;

        Ok(Self::new(
            Arc::new(client),
            config.collection_name.clone(),
            embedder,
            config.embed_batch_size,
        ))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_error(&self, e: impl std::fmt::Display) -> WriteError {
        WriteError::Collection {
            collection: self.collection.clone(),
            detail: e.to_string(),
        }
    }

    /// Create the collection (cosine, embedder dimension) with a keyword
    /// index on `source` unless it exists. Returns whether it was created.
    pub async fn ensure_collection(&self) -> Result<bool, WriteError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| self.collection_error(e))?;
        if exists {
            debug!(collection = %self.collection, "Collection already exists");
            return Ok(false);
        }

        let dimension = self.embedder.dimension() as u64;
        let vectors_config = VectorsConfig::from(VectorParamsBuilder::new(dimension, Distance::Cosine));
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(vectors_config),
            )
            .await
            .map_err(|e| self.collection_error(e))?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                "source",
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| self.collection_error(e))?;

        info!(collection = %self.collection, dimension, "Collection created");
        Ok(true)
    }

    /// Drop the collection. Returns whether anything was deleted.
    pub async fn clear_collection(&self) -> Result<bool, WriteError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| self.collection_error(e))?;
        if !exists {
            return Ok(false);
        }

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| self.collection_error(e))?;
        info!(collection = %self.collection, "Collection deleted");
        Ok(true)
    }

    /// Exact number of points in the collection.
    pub async fn count(&self) -> Result<u64, WriteError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| self.collection_error(e))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

#[async_trait]
impl VectorStoreWriter for QdrantWriter {
    async fn write_batch(&self, records: &[PageRecord]) -> Result<usize, WriteError> {
        let mut written = 0;

        for chunk in records.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|r| r.content().to_string()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| WriteError::Embedding(e.to_string()))?;

            if vectors.len() != chunk.len() {
                return Err(WriteError::EmbeddingMismatch {
                    expected: chunk.len(),
                    actual: vectors.len(),
                });
            }

            let points: Vec<PointStruct> = chunk
                .iter()
                .zip(vectors)
                .map(|(record, vector)| {
                    let id = document_id(record.document_key(), record.page_number());
                    PointStruct::new(PointId::from(id.to_string()), vector, payload(record))
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(|e| WriteError::Upsert {
                    collection: self.collection.clone(),
                    detail: e.to_string(),
                })?;

            written += chunk.len();
            debug!(collection = %self.collection, count = chunk.len(), "Points upserted");
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{PageBody, ProcessingMode};
    use crate::pipeline::assemble::{assemble, Assembled, PageText};

    fn record(page: usize, prefix: &str) -> PageRecord {
        let raw = "The girdle of Venus is a semicircle above the heart line.";
        let text = PageText {
            source: "cheiro.pdf",
            document_key: "english/cheiro.pdf",
            page_number: page,
            raw_text: raw,
            overlap_prefix: prefix,
        };
        match assemble(text, PageBody::Hybrid { diagram: None }, 10) {
            Assembled::Record(r) => r,
            Assembled::Skipped { .. } => panic!("fixture too short"),
        }
    }

    #[test]
    fn document_id_is_stable_per_source_and_page() {
        assert_eq!(document_id("a.pdf", 1), document_id("a.pdf", 1));
        assert_ne!(document_id("a.pdf", 1), document_id("a.pdf", 2));
        assert_ne!(document_id("a.pdf", 1), document_id("b.pdf", 1));
        assert_eq!(document_id("a.pdf", 1).get_version_num(), 5);
        assert_ne!(
            document_id("vol1/intro.pdf", 1),
            document_id("vol2/intro.pdf", 1)
        );
    }

    #[test]
    fn points_are_keyed_by_relative_path() {
        let r = record(3, "");
        assert_eq!(r.source(), "cheiro.pdf");
        assert_eq!(
            document_id(r.document_key(), r.page_number()),
            document_id("english/cheiro.pdf", 3)
        );
        assert_ne!(
            document_id(r.document_key(), r.page_number()),
            document_id("cheiro.pdf", 3)
        );
    }

    #[test]
    fn payload_carries_metadata_keys() {
        let r = record(12, "tail");
        let p = payload(&r);
        assert_eq!(p["text"], Value::String(r.content().to_string()));
        assert_eq!(p["source"], "cheiro.pdf");
        assert_eq!(p["source_path"], "english/cheiro.pdf");
        assert_eq!(p["page"], 12);
        assert_eq!(p["type"], "hybrid_book_page");
        assert_eq!(p["processing_mode"], ProcessingMode::Hybrid.as_str());
        assert_eq!(p["has_overlap"], true);
        assert!(p["processed_at"].as_str().is_some_and(|s| s.ends_with('Z')));
        assert_eq!(p.len(), 8);
    }

    #[test]
    fn payload_without_overlap() {
        let p = payload(&record(1, ""));
        assert_eq!(p["has_overlap"], false);
    }
}
