use utoipa::OpenApi;

use crate::chunker::ChunkMethod;
use crate::chunks::{Chunk, ChunkFileInfo};
use crate::embedding::{EmbeddingFileMetadata, EmbeddingFileStats, EmbeddingStats, ModelType};
use crate::error::{ErrorResponse, HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::loader::LoadedFileInfo;
use crate::models::{
    ChunkFilesResponse, ChunkRequest, ChunkResponse, CollectionsResponse, EmbeddingRequest,
    EmbeddingResponse, EmbeddingStatsResponse, LoadedFilesResponse, MessageResponse,
    SearchRequest, SearchResponse, StoreRequest, StoreResponse, UploadForm, UploadResponse,
    UploadedFileResponse, VectorFilesResponse,
};
use crate::vector_store::{CollectionInfo, Metric, SearchHit, StoreDetails, VectorFileStat};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rag-pipeline API",
        version = "0.1.0",
        description = "Upload, chunk, embed and index documents for retrieval-augmented generation"
    ),
    paths(
        handlers::health::health_handler,
        handlers::upload::upload_handler,
        handlers::files::loaded_files_handler,
        handlers::files::chunked_files_handler,
        handlers::chunk::chunk_handler,
        handlers::embedding::embedding_handler,
        handlers::embedding::embedding_stats_handler,
        handlers::vectors::vector_files_handler,
        handlers::vectors::store_vectors_handler,
        handlers::vectors::collections_handler,
        handlers::vectors::search_handler
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            UnhealthyResponse,
            MessageResponse,
            UploadForm,
            UploadResponse,
            UploadedFileResponse,
            LoadedFilesResponse,
            LoadedFileInfo,
            ChunkRequest,
            ChunkResponse,
            ChunkMethod,
            Chunk,
            ChunkFilesResponse,
            ChunkFileInfo,
            EmbeddingRequest,
            EmbeddingResponse,
            EmbeddingFileMetadata,
            EmbeddingStatsResponse,
            EmbeddingStats,
            EmbeddingFileStats,
            ModelType,
            VectorFilesResponse,
            VectorFileStat,
            StoreRequest,
            StoreResponse,
            StoreDetails,
            Metric,
            CollectionsResponse,
            CollectionInfo,
            SearchRequest,
            SearchResponse,
            SearchHit
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "files", description = "Document upload and listings"),
        (name = "pipeline", description = "Chunking and embedding"),
        (name = "vectors", description = "Vector collections and search")
    )
)]
pub struct ApiDoc;
