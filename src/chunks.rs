use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::chunker::{self, ChunkMethod, ChunkOptions};
use crate::error::ServiceError;
use crate::loader::{DocumentLoader, LoadedDocument};
use crate::storage::{Area, FileStore};

/// A single piece of a chunked document; ids start at 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Chunk {
    pub id: usize,
    pub content: String,
}

/// A load record extended with its chunks, persisted in `chunk/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedDocument {
    #[serde(flatten)]
    pub source: LoadedDocument,
    pub chunks: Vec<Chunk>,
    pub chunk_method: ChunkMethod,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_separator: Option<String>,
    #[serde(default)]
    pub chunked_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub file_id: String,
    pub chunk_file_id: String,
    pub chunks: Vec<Chunk>,
    pub chunk_method: ChunkMethod,
    pub output_path: PathBuf,
}

/// Entry of the chunk-file listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChunkFileInfo {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    pub chunk_method: String,
    pub chunk_count: usize,
    pub file_path: String,
    pub created_at: String,
    pub file_size_bytes: u64,
}

/// Only the fields the listing needs, tolerant of older or partial files.
#[derive(Deserialize)]
struct ChunkFileSummary {
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    chunk_method: Option<String>,
    #[serde(default)]
    chunks: Vec<serde_json::Value>,
    #[serde(default)]
    chunked_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChunkService {
    store: FileStore,
    loader: DocumentLoader,
}

impl ChunkService {
    pub fn new(store: FileStore) -> Self {
        Self {
            loader: DocumentLoader::new(store.clone()),
            store,
        }
    }

    /// Chunk a loaded document and write the result as a new chunk file.
    pub async fn process(
        &self,
        file_id: &str,
        options: &ChunkOptions,
    ) -> Result<ChunkOutcome, ServiceError> {
        options.validate()?;

        let document = self.loader.read(file_id).await?;
        if document.content.trim().is_empty() {
            return Err(ServiceError::EmptyContent);
        }

        let pieces = chunker::split(&document.content, options)?;
        if pieces.is_empty() {
            return Err(ServiceError::NoChunks);
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk { id: i + 1, content })
            .collect();

        let source_stem = self
            .store
            .find_by_id(Area::Load, file_id)
            .await?
            .map(|f| f.stem)
            .unwrap_or_else(|| file_id.to_string());
        let now = Local::now();
        let chunk_file_id = format!("{}_chunked_{}", source_stem, now.format("%Y%m%d%H%M%S"));
        let output_path = self.store.path(Area::Chunk, &format!("{}.json", chunk_file_id));

        let chunked = ChunkedDocument {
            source: document,
            chunks,
            chunk_method: options.method,
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
            chunk_separator: (options.method == ChunkMethod::Custom)
                .then(|| options.separator.clone()),
            chunked_at: Some(now.to_rfc3339()),
        };
        self.store.write_json(&output_path, &chunked).await?;

        tracing::info!(
            "Chunked {} into {} chunks with {} (size {}, overlap {})",
            file_id,
            chunked.chunks.len(),
            options.method,
            options.chunk_size,
            options.chunk_overlap
        );

        Ok(ChunkOutcome {
            file_id: file_id.to_string(),
            chunk_file_id,
            chunks: chunked.chunks,
            chunk_method: options.method,
            output_path,
        })
    }

    /// Every chunk file, newest first.
    pub async fn chunked_files(&self) -> Result<Vec<ChunkFileInfo>, ServiceError> {
        let files = self.store.list_json(Area::Chunk).await?;

        let mut listed = Vec::with_capacity(files.len());
        for file in files {
            let summary: ChunkFileSummary = match self.store.read_json(&file.path).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable chunk file {}: {:#}",
                        file.path.display(),
                        e
                    );
                    continue;
                }
            };

            listed.push(ChunkFileInfo {
                id: file.stem.clone(),
                filename: file.file_name.clone(),
                original_filename: summary.file_name.unwrap_or_else(|| "unknown".to_string()),
                chunk_method: summary.chunk_method.unwrap_or_else(|| "unknown".to_string()),
                chunk_count: summary.chunks.len(),
                file_path: file.path.display().to_string(),
                created_at: summary
                    .chunked_at
                    .unwrap_or_else(|| file.modified.to_rfc3339()),
                file_size_bytes: file.size_bytes,
            });
        }

        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    /// Read a chunk file by exact id or prefix. Returns the resolved id with the document.
    pub async fn read(
        &self,
        chunk_file_id: &str,
    ) -> Result<(String, ChunkedDocument), ServiceError> {
        let not_found = || ServiceError::NotFound {
            kind: "chunk",
            id: chunk_file_id.to_string(),
        };
        if !crate::storage::is_safe_name(chunk_file_id) {
            return Err(not_found());
        }

        let file = self
            .store
            .find_by_id(Area::Chunk, chunk_file_id)
            .await?
            .ok_or_else(not_found)?;
        let document = self.store.read_json(&file.path).await?;
        Ok((file.stem, document))
    }
}
