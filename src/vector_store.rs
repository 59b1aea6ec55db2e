//! File-backed vector collections with exact nearest-neighbour search.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::embedding::EmbeddingService;
use crate::error::ServiceError;
use crate::storage::{Area, FileStore};

/// Upper bound on stored chunk text, in characters
pub const MAX_TEXT_CONTENT_CHARS: usize = 65_534;

const MAX_COLLECTION_NAME_LEN: usize = 255;

pub const STORE_VERSION: &str = concat!("rag-pipeline-store/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Metric {
    /// Squared Euclidean distance, smaller is closer
    #[default]
    L2,
    /// Inner product, larger is closer
    #[serde(rename = "IP")]
    Ip,
}

impl FromStr for Metric {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "L2" => Ok(Metric::L2),
            "IP" => Ok(Metric::Ip),
            _ => Err(ServiceError::InvalidMetric(s.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::L2 => "L2",
            Metric::Ip => "IP",
        })
    }
}

impl Metric {
    fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Metric::Ip => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }

    /// Order two scores so that the closer one sorts first.
    fn closer(self, a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match self {
            Metric::L2 => ord,
            Metric::Ip => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub embedding: Vec<f32>,
    pub text_content: String,
    pub original_doc_id: String,
    pub chunk_seq_num: i64,
}

/// Contents of `db/<name>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub description: String,
    pub dimension: usize,
    pub metric: Metric,
    pub created_at: String,
    pub records: Vec<VectorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub vector_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StoreDetails {
    pub collection_name: String,
    pub vectors_inserted: usize,
    pub total_chunks_in_file: usize,
    /// Metric of the collection, which is fixed when it is created
    pub metric: Metric,
    pub db_path: String,
    pub store_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub text_content: String,
    pub original_doc_id: String,
    pub chunk_seq_num: i64,
}

/// Statistics of one embedding file; unparsable files only carry `error`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct VectorFileStat {
    pub vector_file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub file_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Loose view of an embedding file's metadata for the statistics listing
#[derive(Deserialize)]
struct EmbeddingFileHeader {
    #[serde(default)]
    embedding_metadata: EmbeddingMetadataHeader,
}

#[derive(Deserialize, Default)]
struct EmbeddingMetadataHeader {
    chunk_file_id: Option<String>,
    embedding_model_type: Option<String>,
    embedding_model_name: Option<String>,
    embedding_model_dim: Option<usize>,
    processed_chunk_count: Option<usize>,
    total_chunk_count: Option<usize>,
    embedding_time_seconds: Option<f64>,
    embedding_timestamp: Option<String>,
}

pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_COLLECTION_NAME_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    store: FileStore,
    embeddings: EmbeddingService,
    write_lock: Arc<Mutex<()>>,
}

impl VectorStore {
    pub fn new(store: FileStore, embeddings: EmbeddingService) -> Self {
        Self {
            store,
            embeddings,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.store.dir(Area::Db)
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.store.path(Area::Db, &format!("{}.json", name))
    }

    async fn load_collection(&self, name: &str) -> Result<Option<Collection>, ServiceError> {
        let path = self.collection_path(name);
        let exists = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check collection file {}", path.display()))?;
        if !exists {
            return Ok(None);
        }
        Ok(Some(self.store.read_json(&path).await?))
    }

    /// Statistics for every embedding file.
    pub async fn vector_file_stats(&self) -> Result<Vec<VectorFileStat>, ServiceError> {
        let files = self.store.list_json(Area::Embedding).await?;

        let mut stats = Vec::with_capacity(files.len());
        for file in files {
            match self.store.read_json::<EmbeddingFileHeader>(&file.path).await {
                Ok(header) => {
                    let meta = header.embedding_metadata;
                    let original_file_id = meta.chunk_file_id.unwrap_or_else(|| {
                        file.stem
                            .strip_suffix("_embedded")
                            .unwrap_or(&file.stem)
                            .to_string()
                    });
                    stats.push(VectorFileStat {
                        vector_file_name: file.file_name,
                        original_file_id: Some(original_file_id),
                        model_type: meta.embedding_model_type,
                        model_name: meta.embedding_model_name,
                        model_dim: meta.embedding_model_dim,
                        processed_chunks: meta.processed_chunk_count,
                        total_chunks: meta.total_chunk_count,
                        embedding_time_seconds: meta.embedding_time_seconds,
                        created_at: meta.embedding_timestamp,
                        file_size_bytes: file.size_bytes,
                        last_modified: Some(file.modified.to_rfc3339()),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::error!("Error reading vector file {}: {:#}", file.path.display(), e);
                    stats.push(VectorFileStat {
                        vector_file_name: file.file_name,
                        file_size_bytes: file.size_bytes,
                        error: Some(format!("Invalid JSON format: {:#}", e)),
                        ..VectorFileStat::default()
                    });
                }
            }
        }

        tracing::info!("Retrieved stats for {} vector files", stats.len());
        Ok(stats)
    }

    /// Insert the vectors of an embedding file into a collection, creating
    /// the collection on first use.
    pub async fn store_embeddings(
        &self,
        embedding_file_id: &str,
        collection_name: &str,
        dimension: Option<usize>,
        metric: Metric,
    ) -> Result<StoreDetails, ServiceError> {
        if !is_valid_collection_name(collection_name) {
            return Err(ServiceError::InvalidCollectionName(collection_name.to_string()));
        }

        let file = self.embeddings.read(embedding_file_id).await?;
        if file.chunks.is_empty() {
            return Err(ServiceError::NoVectors);
        }

        let dimension = match dimension {
            Some(d) => d,
            None => {
                let inferred = file.chunks[0].embedding.len();
                tracing::info!("Inferred embedding dimension: {}", inferred);
                inferred
            }
        };
        if dimension == 0 {
            return Err(ServiceError::InvalidDimension(
                "dimension must be greater than 0".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;

        let mut collection = match self.load_collection(collection_name).await? {
            Some(existing) => {
                if existing.dimension != dimension {
                    return Err(ServiceError::InvalidDimension(format!(
                        "collection '{}' has dimension {}, got {}",
                        collection_name, existing.dimension, dimension
                    )));
                }
                if existing.metric != metric {
                    tracing::warn!(
                        "Collection '{}' uses metric {}, ignoring requested {}",
                        collection_name,
                        existing.metric,
                        metric
                    );
                }
                tracing::info!("Collection '{}' already exists, appending", collection_name);
                existing
            }
            None => {
                tracing::info!("Creating new collection: '{}'", collection_name);
                Collection {
                    name: collection_name.to_string(),
                    description: format!(
                        "Collection for document chunks from {}",
                        file.embedding_metadata.chunk_file_id
                    ),
                    dimension,
                    metric,
                    created_at: Local::now().to_rfc3339(),
                    records: Vec::new(),
                }
            }
        };

        let original_doc_id = file.embedding_metadata.chunk_file_id.clone();
        let mut inserted = 0;
        for (idx, chunk) in file.chunks.iter().enumerate() {
            if chunk.embedding.len() != dimension {
                tracing::warn!(
                    "Skipping chunk {} due to missing or mismatched embedding dimension",
                    idx
                );
                continue;
            }
            collection.records.push(VectorRecord {
                id: Uuid::new_v4(),
                embedding: chunk.embedding.clone(),
                text_content: chunk.content.chars().take(MAX_TEXT_CONTENT_CHARS).collect(),
                original_doc_id: original_doc_id.clone(),
                chunk_seq_num: chunk.id as i64,
            });
            inserted += 1;
        }
        if inserted == 0 {
            return Err(ServiceError::NoVectors);
        }

        self.store
            .write_json(&self.collection_path(collection_name), &collection)
            .await?;

        tracing::info!("Inserted {} vectors into '{}'", inserted, collection_name);

        Ok(StoreDetails {
            collection_name: collection_name.to_string(),
            vectors_inserted: inserted,
            total_chunks_in_file: file.chunks.len(),
            metric: collection.metric,
            db_path: self.db_path().display().to_string(),
            store_version: STORE_VERSION.to_string(),
        })
    }

    pub async fn collections(&self) -> Result<Vec<CollectionInfo>, ServiceError> {
        let files = self.store.list_json(Area::Db).await?;

        let mut infos = Vec::with_capacity(files.len());
        for file in files {
            match self.store.read_json::<Collection>(&file.path).await {
                Ok(c) => infos.push(CollectionInfo {
                    vector_count: c.records.len(),
                    name: c.name,
                    dimension: c.dimension,
                    metric: c.metric,
                    created_at: c.created_at,
                }),
                Err(e) => tracing::warn!(
                    "Skipping unreadable collection {}: {:#}",
                    file.path.display(),
                    e
                ),
            }
        }
        Ok(infos)
    }

    /// Exact top-k search over a collection.
    pub async fn search(
        &self,
        collection_name: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        if !is_valid_collection_name(collection_name) {
            return Err(ServiceError::InvalidCollectionName(collection_name.to_string()));
        }
        let collection = self
            .load_collection(collection_name)
            .await?
            .ok_or_else(|| ServiceError::CollectionNotFound(collection_name.to_string()))?;

        if query.len() != collection.dimension {
            return Err(ServiceError::InvalidDimension(format!(
                "query has dimension {}, collection '{}' expects {}",
                query.len(),
                collection_name,
                collection.dimension
            )));
        }

        let metric = collection.metric;
        let mut scored: Vec<(f32, VectorRecord)> = collection
            .records
            .into_iter()
            .map(|r| (metric.score(query, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| metric.closer(a.0, b.0));
        scored.truncate(top_k);

        tracing::debug!("Search in '{}' returned {} hits", collection_name, scored.len());

        Ok(scored
            .into_iter()
            .map(|(score, r)| SearchHit {
                id: r.id,
                score,
                text_content: r.text_content,
                original_doc_id: r.original_doc_id,
                chunk_seq_num: r.chunk_seq_num,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::registry;
    use crate::embedding::{
        EmbeddedChunk, EmbeddingFile, EmbeddingFileMetadata, ModelType, VectorMetadata,
    };
    use serde_json::json;

    async fn setup() -> (tempfile::TempDir, FileStore, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("files")).await.unwrap();
        let embeddings = EmbeddingService::new(store.clone(), registry(3));
        (dir, store.clone(), VectorStore::new(store, embeddings))
    }

    fn chunk(id: usize, content: &str, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            id,
            content: content.to_string(),
            embedding_metadata: VectorMetadata {
                model_type: ModelType::HuggingFace,
                model_name: "test".to_string(),
                dimension: embedding.len(),
                processing_time_ms: 0.0,
                timestamp: "2025-01-01T00:00:00+00:00".to_string(),
            },
            embedding,
        }
    }

    async fn write_embedding_file(store: &FileStore, stem: &str, chunks: Vec<EmbeddedChunk>) {
        let file = EmbeddingFile {
            embedding_metadata: EmbeddingFileMetadata {
                chunk_file_id: "doc_chunked_1".to_string(),
                source_file_name: "doc.txt".to_string(),
                chunk_method: "custom".to_string(),
                embedding_model_type: ModelType::HuggingFace,
                embedding_model_name: "test".to_string(),
                embedding_model_dim: chunks.first().map_or(0, |c| c.embedding.len()),
                processed_chunk_count: chunks.len(),
                total_chunk_count: chunks.len(),
                embedding_time_seconds: 0.1,
                embedding_timestamp: "2025-01-01T00:00:00+00:00".to_string(),
            },
            chunks,
        };
        store
            .write_json(&store.path(Area::Embedding, &format!("{}.json", stem)), &file)
            .await
            .unwrap();
    }

    fn sample_chunks() -> Vec<EmbeddedChunk> {
        vec![
            chunk(1, "north", vec![0.0, 1.0, 0.0]),
            chunk(2, "east", vec![1.0, 0.0, 0.0]),
            chunk(3, "broken", vec![1.0, 0.0]),
            chunk(4, "up", vec![0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn test_collection_name_rules() {
        assert!(is_valid_collection_name("docs"));
        assert!(is_valid_collection_name("_docs_2024"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("2docs"));
        assert!(!is_valid_collection_name("my-docs"));
        assert!(!is_valid_collection_name("../docs"));
        assert!(!is_valid_collection_name(&"a".repeat(256)));
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!("IP".parse::<Metric>().unwrap(), Metric::Ip);
        assert!("cosine".parse::<Metric>().is_err());
    }

    #[tokio::test]
    async fn test_store_skips_mismatched_chunks() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;

        let details = vectors
            .store_embeddings("doc_embedded.json", "docs", None, Metric::L2)
            .await
            .unwrap();

        assert_eq!(details.collection_name, "docs");
        assert_eq!(details.vectors_inserted, 3);
        assert_eq!(details.total_chunks_in_file, 4);
        assert_eq!(details.store_version, STORE_VERSION);

        let collections = vectors.collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].dimension, 3);
        assert_eq!(collections[0].vector_count, 3);
    }

    #[tokio::test]
    async fn test_store_appends_to_existing_collection() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;

        vectors.store_embeddings("doc_embedded", "docs", Some(3), Metric::L2).await.unwrap();
        vectors.store_embeddings("doc_embedded", "docs", None, Metric::L2).await.unwrap();

        let collections = vectors.collections().await.unwrap();
        assert_eq!(collections[0].vector_count, 6);
    }

    #[tokio::test]
    async fn test_store_reports_metric_of_existing_collection() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;

        let created = vectors
            .store_embeddings("doc_embedded", "ip_docs", None, Metric::Ip)
            .await
            .unwrap();
        assert_eq!(created.metric, Metric::Ip);

        let appended = vectors
            .store_embeddings("doc_embedded", "ip_docs", None, Metric::L2)
            .await
            .unwrap();
        assert_eq!(appended.metric, Metric::Ip);
        assert_eq!(vectors.collections().await.unwrap()[0].metric, Metric::Ip);
    }

    #[tokio::test]
    async fn test_unreadable_db_area_is_an_error() {
        let (_dir, store, vectors) = setup().await;
        let db = store.dir(Area::Db);
        tokio::fs::remove_dir(&db).await.unwrap();
        tokio::fs::write(&db, b"not a directory").await.unwrap();

        let err = vectors.load_collection("docs").await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn test_store_rejects_dimension_mismatch_with_collection() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;
        vectors.store_embeddings("doc_embedded", "docs", None, Metric::L2).await.unwrap();

        let err = vectors
            .store_embeddings("doc_embedded", "docs", Some(2), Metric::L2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDimension(_)));
    }

    #[tokio::test]
    async fn test_store_validation_errors() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;

        let err = vectors
            .store_embeddings("doc_embedded", "bad-name", None, Metric::L2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCollectionName(_)));

        let err = vectors
            .store_embeddings("doc_embedded", "docs", Some(0), Metric::L2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDimension(_)));

        let err = vectors
            .store_embeddings("doc_embedded", "docs", Some(7), Metric::L2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoVectors));

        let err = vectors
            .store_embeddings("nope", "docs", None, Metric::L2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { kind: "embedding", .. }));
    }

    #[tokio::test]
    async fn test_text_content_is_truncated() {
        let (_dir, store, vectors) = setup().await;
        let long = "字".repeat(MAX_TEXT_CONTENT_CHARS + 10);
        write_embedding_file(&store, "long_embedded", vec![chunk(1, &long, vec![1.0, 1.0, 1.0])])
            .await;

        vectors.store_embeddings("long_embedded", "long", None, Metric::L2).await.unwrap();
        let hits = vectors.search("long", &[1.0, 1.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].text_content.chars().count(), MAX_TEXT_CONTENT_CHARS);
    }

    #[tokio::test]
    async fn test_search_l2_orders_by_distance() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;
        vectors.store_embeddings("doc_embedded", "docs", None, Metric::L2).await.unwrap();

        let hits = vectors.search("docs", &[0.9, 0.1, 0.0], 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text_content, "east");
        assert_eq!(hits[0].chunk_seq_num, 2);
        assert_eq!(hits[0].original_doc_id, "doc_chunked_1");
        assert_eq!(hits[1].text_content, "north");
        assert!(hits[0].score <= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_inner_product() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;
        vectors.store_embeddings("doc_embedded", "ip_docs", None, Metric::Ip).await.unwrap();

        let hits = vectors.search("ip_docs", &[0.0, 0.2, 5.0], 3).await.unwrap();
        let order: Vec<_> = hits.iter().map(|h| h.text_content.as_str()).collect();
        assert_eq!(order, vec!["up", "north", "east"]);
    }

    #[tokio::test]
    async fn test_search_errors() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;
        vectors.store_embeddings("doc_embedded", "docs", None, Metric::L2).await.unwrap();

        assert!(matches!(
            vectors.search("missing", &[0.0, 0.0, 0.0], 1).await,
            Err(ServiceError::CollectionNotFound(_))
        ));
        assert!(matches!(
            vectors.search("docs", &[0.0, 0.0], 1).await,
            Err(ServiceError::InvalidDimension(_))
        ));
    }

    #[tokio::test]
    async fn test_vector_file_stats() {
        let (_dir, store, vectors) = setup().await;
        write_embedding_file(&store, "doc_embedded", sample_chunks()).await;
        store
            .write_json(
                &store.path(Area::Embedding, "legacy_embedded.json"),
                &json!({"chunks": []}),
            )
            .await
            .unwrap();
        store
            .write_bytes(&store.path(Area::Embedding, "invalid.json"), b"this is not json")
            .await
            .unwrap();

        let stats = vectors.vector_file_stats().await.unwrap();
        assert_eq!(stats.len(), 3);

        let doc = stats.iter().find(|s| s.vector_file_name == "doc_embedded.json").unwrap();
        assert_eq!(doc.original_file_id.as_deref(), Some("doc_chunked_1"));
        assert_eq!(doc.model_dim, Some(3));
        assert_eq!(doc.processed_chunks, Some(4));
        assert!(doc.error.is_none());

        let legacy = stats.iter().find(|s| s.vector_file_name == "legacy_embedded.json").unwrap();
        assert_eq!(legacy.original_file_id.as_deref(), Some("legacy"));
        assert_eq!(legacy.model_name, None);

        let invalid = stats.iter().find(|s| s.vector_file_name == "invalid.json").unwrap();
        assert!(invalid.error.as_deref().unwrap().contains("Invalid JSON"));
        assert!(invalid.file_size_bytes > 0);
    }
}
