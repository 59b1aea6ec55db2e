use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkMethod;
use crate::chunks::{Chunk, ChunkFileInfo, ChunkOutcome};
use crate::embedding::{EmbeddingFileMetadata, EmbeddingOutcome, EmbeddingStats};
use crate::loader::{LoadedFileInfo, UploadOutcome};
use crate::vector_store::{CollectionInfo, SearchHit, StoreDetails, VectorFileStat};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

/// Accept `5` as well as `"5"` for optional numeric request fields.
fn lenient_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => usize::try_from(n).map(Some).map_err(de::Error::custom),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| {
                de::Error::custom(format!("expected a non-negative integer, got '{}'", s))
            }),
    }
}

/// Request body for POST /api/chunk
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub file_id: Option<String>,
    /// `sentence` (alias `llamaindex`), `recursive` (alias `langchain`) or `custom`
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    #[schema(value_type = Option<u64>)]
    pub chunk_size: Option<usize>,
    #[serde(default, deserialize_with = "lenient_usize")]
    #[schema(value_type = Option<u64>)]
    pub chunk_overlap: Option<usize>,
    pub separator: Option<String>,
}

/// Request body for POST /api/embedding
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRequest {
    pub chunk_file_id: Option<String>,
    /// `huggingface` (default) or `openai`
    pub model_type: Option<String>,
}

/// Request body for POST /api/vectors/store
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreRequest {
    pub embedding_file_id: Option<String>,
    pub collection_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    #[schema(value_type = Option<u64>)]
    pub dimension: Option<usize>,
    /// `L2` (default) or `IP`
    pub metric: Option<String>,
}

/// Request body for POST /api/vectors/search
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub collection_name: Option<String>,
    /// Text to embed and search with
    pub query: Option<String>,
    /// Ready-made query vector
    pub vector: Option<Vec<f32>>,
    pub model_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_usize")]
    #[schema(value_type = Option<u64>)]
    pub top_k: Option<usize>,
}

/// Multipart form accepted by POST /api/upload
#[derive(Deserialize, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// Text document (txt, md, markdown, csv, json, log)
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Load method chosen by the client, `auto` when absent
    #[serde(rename = "type")]
    pub file_type: Option<String>,
}

/// Stored upload as reported to the client
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadedFileResponse {
    pub id: String,
    pub original_filename: String,
    pub filename: String,
    pub upload_path: String,
    pub load_path: String,
    pub timestamp: String,
    pub file_type: String,
}

/// Response type for POST /api/upload
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file: UploadedFileResponse,
    pub content_length: usize,
    pub content_preview: String,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        let file = outcome.file;
        Self {
            success: true,
            message: format!("File {} uploaded and loaded", file.original_filename),
            file: UploadedFileResponse {
                id: file.id,
                original_filename: file.original_filename,
                filename: file.filename,
                upload_path: file.upload_path.display().to_string(),
                load_path: file.load_path.display().to_string(),
                timestamp: file.timestamp,
                file_type: file.file_type,
            },
            content_length: outcome.content_length,
            content_preview: outcome.content_preview,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoadedFilesResponse {
    pub success: bool,
    pub files: Vec<LoadedFileInfo>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChunkFilesResponse {
    pub success: bool,
    pub files: Vec<ChunkFileInfo>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct VectorFilesResponse {
    pub success: bool,
    pub files: Vec<VectorFileStat>,
    pub timestamp: String,
}

/// Response type for POST /api/chunk
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChunkResponse {
    pub success: bool,
    pub file_id: String,
    pub chunk_file_id: String,
    pub chunks: Vec<Chunk>,
    pub chunk_method: ChunkMethod,
    pub chunk_count: usize,
    pub output_path: String,
}

impl From<ChunkOutcome> for ChunkResponse {
    fn from(outcome: ChunkOutcome) -> Self {
        Self {
            success: true,
            chunk_count: outcome.chunks.len(),
            file_id: outcome.file_id,
            chunk_file_id: outcome.chunk_file_id,
            chunks: outcome.chunks,
            chunk_method: outcome.chunk_method,
            output_path: outcome.output_path.display().to_string(),
        }
    }
}

/// Response type for POST /api/embedding
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmbeddingResponse {
    pub success: bool,
    pub message: String,
    pub metadata: EmbeddingFileMetadata,
    pub embedding_file: String,
}

impl From<EmbeddingOutcome> for EmbeddingResponse {
    fn from(outcome: EmbeddingOutcome) -> Self {
        Self {
            success: true,
            message: outcome.message,
            metadata: outcome.metadata,
            embedding_file: outcome.embedding_file.display().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmbeddingStatsResponse {
    pub success: bool,
    pub stats: EmbeddingStats,
}

/// Returned with 404 when no embedding file exists yet
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Response type for POST /api/vectors/store
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StoreResponse {
    pub success: bool,
    pub message: String,
    pub details: StoreDetails,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CollectionsResponse {
    pub success: bool,
    pub collections: Vec<CollectionInfo>,
}

/// Response type for POST /api/vectors/search
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    pub collection_name: String,
    pub top_k: usize,
    pub results: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_fields_accept_strings() {
        let req: ChunkRequest = serde_json::from_value(json!({
            "fileId": "doc_20240101000000",
            "chunkSize": "300",
            "chunkOverlap": 20
        }))
        .unwrap();

        assert_eq!(req.file_id.as_deref(), Some("doc_20240101000000"));
        assert_eq!(req.chunk_size, Some(300));
        assert_eq!(req.chunk_overlap, Some(20));
        assert_eq!(req.method, None);
    }

    #[test]
    fn test_absent_and_null_numbers_are_none() {
        let req: SearchRequest =
            serde_json::from_value(json!({"collectionName": "docs", "topK": null})).unwrap();
        assert_eq!(req.top_k, None);

        let req: StoreRequest = serde_json::from_value(json!({"dimension": ""})).unwrap();
        assert_eq!(req.dimension, None);
    }

    #[test]
    fn test_non_numeric_strings_rejected() {
        let result: Result<ChunkRequest, _> =
            serde_json::from_value(json!({"fileId": "x", "chunkSize": "big"}));
        assert!(result.is_err());

        let result: Result<ChunkRequest, _> =
            serde_json::from_value(json!({"fileId": "x", "chunkSize": -5}));
        assert!(result.is_err());
    }
}
