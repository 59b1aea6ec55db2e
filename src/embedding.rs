//! Embedding models and the chunk-file embedding pipeline.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chunks::ChunkService;
use crate::config::Config;
use crate::error::ServiceError;
use crate::storage::{Area, FileStore, is_safe_name};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    HuggingFace,
    OpenAi,
}

impl FromStr for ModelType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" => Ok(ModelType::HuggingFace),
            "openai" => Ok(ModelType::OpenAi),
            _ => Err(ServiceError::UnsupportedModel(s.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelType::HuggingFace => "huggingface",
            ModelType::OpenAi => "openai",
        })
    }
}

/// A text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_type(&self) -> ModelType;

    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

fn http_client(timeout_secs: u64) -> anyhow::Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

async fn provider_error(response: reqwest::Response) -> ServiceError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    tracing::error!(status, message = %message, "Embedding provider returned an error");
    ServiceError::Embedding(format!("provider returned {}: {}", status, message))
}

/// Feature-extraction endpoint of a HuggingFace inference server.
pub struct HuggingFaceEmbedder {
    client: Client,
    base_url: String,
    model: String,
    token: Option<String>,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(config.embedding_timeout_secs)?,
            base_url: config.hf_inference_url.trim_end_matches('/').to_string(),
            model: config.hf_embedding_model.clone(),
            token: config.hf_api_token.clone(),
        })
    }
}

/// Turn a feature-extraction response into one sentence vector.
///
/// Servers answer with a pooled vector, a per-token matrix or a batch of
/// per-token matrices; for token matrices the first row (the `[CLS]` token)
/// is the sentence representation.
pub fn parse_feature_extraction(value: JsonValue) -> Result<Vec<f32>, ServiceError> {
    let mut current = value;
    loop {
        let JsonValue::Array(items) = current else {
            return Err(ServiceError::Embedding(
                "unexpected feature-extraction response shape".to_string(),
            ));
        };
        if items.is_empty() {
            return Err(ServiceError::Embedding("empty embedding returned".to_string()));
        }
        if items[0].is_array() {
            current = items.into_iter().next().unwrap_or(JsonValue::Null);
            continue;
        }
        return items
            .into_iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    ServiceError::Embedding("non-numeric value in embedding".to_string())
                })
            })
            .collect();
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_type(&self) -> ModelType {
        ModelType::HuggingFace
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let url = format!("{}/pipeline/feature-extraction/{}", self.base_url, self.model);
        tracing::debug!(
            url = %url,
            chars = text.chars().count(),
            "Requesting HuggingFace embedding"
        );

        let mut request = self.client.post(&url).json(&serde_json::json!({
            "inputs": text,
            "options": { "wait_for_model": true }
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Embedding(e.to_string()))?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| ServiceError::Embedding(e.to_string()))?;
        parse_feature_extraction(body)
    }
}

/// OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(config: &Config, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(config.embedding_timeout_secs)?,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_embedding_model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_type(&self) -> ModelType {
        ModelType::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        tracing::debug!(url = %url, chars = text.chars().count(), "Requesting OpenAI embedding");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| ServiceError::Embedding(e.to_string()))?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Embedding(e.to_string()))?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::Embedding("no embedding in response".to_string()))
    }
}

/// Embedding models available to the service, keyed by type.
#[derive(Default)]
pub struct EmbedderRegistry {
    embedders: HashMap<ModelType, Arc<dyn Embedder>>,
}

impl EmbedderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HuggingFace is always registered; OpenAI only when an API key is set.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(HuggingFaceEmbedder::new(config)?));
        match &config.openai_api_key {
            Some(key) => registry.register(Arc::new(OpenAiEmbedder::new(config, key.clone())?)),
            None => tracing::warn!("OPENAI_API_KEY not set, the openai model is disabled"),
        }
        Ok(registry)
    }

    /// Register an embedder, replacing any previous one of the same type.
    pub fn register(&mut self, embedder: Arc<dyn Embedder>) {
        self.embedders.insert(embedder.model_type(), embedder);
    }

    pub fn get(&self, model_type: ModelType) -> Result<Arc<dyn Embedder>, ServiceError> {
        self.embedders.get(&model_type).cloned().ok_or_else(|| {
            ServiceError::ModelUnavailable(format!("model type '{}' is not configured", model_type))
        })
    }
}

impl fmt::Debug for EmbedderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedderRegistry")
            .field("models", &self.embedders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Metadata attached to every embedded chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct VectorMetadata {
    pub model_type: ModelType,
    pub model_name: String,
    pub dimension: usize,
    pub processing_time_ms: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub id: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    pub embedding_metadata: VectorMetadata,
}

/// File-level metadata of an embedding file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmbeddingFileMetadata {
    pub chunk_file_id: String,
    pub source_file_name: String,
    pub chunk_method: String,
    pub embedding_model_type: ModelType,
    pub embedding_model_name: String,
    pub embedding_model_dim: usize,
    pub processed_chunk_count: usize,
    pub total_chunk_count: usize,
    pub embedding_time_seconds: f64,
    pub embedding_timestamp: String,
}

/// Contents of `embedding/<chunk_file_id>_embedded.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingFile {
    pub chunks: Vec<EmbeddedChunk>,
    pub embedding_metadata: EmbeddingFileMetadata,
}

#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub message: String,
    pub metadata: EmbeddingFileMetadata,
    pub embedding_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmbeddingFileStats {
    pub chunk_count: usize,
    pub embedding_dimensions: usize,
    pub file_size_bytes: u64,
    pub created_at: String,
    pub model_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmbeddingStats {
    pub embedding_file: String,
    pub metadata: EmbeddingFileMetadata,
    pub stats: EmbeddingFileStats,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, Clone)]
pub struct EmbeddingService {
    store: FileStore,
    chunks: ChunkService,
    registry: Arc<EmbedderRegistry>,
}

impl EmbeddingService {
    pub fn new(store: FileStore, registry: Arc<EmbedderRegistry>) -> Self {
        Self {
            chunks: ChunkService::new(store.clone()),
            store,
            registry,
        }
    }

    /// Embed one text and describe how it was produced.
    pub async fn embed_text(
        &self,
        model_type: ModelType,
        text: &str,
    ) -> Result<EmbeddingResult, ServiceError> {
        let embedder = self.registry.get(model_type)?;
        let started = Instant::now();
        let embedding = embedder.embed(text).await?;
        let elapsed = started.elapsed();

        Ok(EmbeddingResult {
            metadata: VectorMetadata {
                model_type,
                model_name: embedder.model_name().to_string(),
                dimension: embedding.len(),
                processing_time_ms: round_to(elapsed.as_secs_f64() * 1000.0, 2),
                timestamp: Local::now().to_rfc3339(),
            },
            embedding,
        })
    }

    /// Embed every chunk of a chunk file and write the embedding file.
    pub async fn process(
        &self,
        chunk_file_id: &str,
        model_type: ModelType,
    ) -> Result<EmbeddingOutcome, ServiceError> {
        let embedder = self.registry.get(model_type)?;
        let (chunk_file_id, chunked) = self.chunks.read(chunk_file_id).await?;
        if chunked.chunks.is_empty() {
            return Err(ServiceError::NoChunks);
        }

        let started = Instant::now();
        let total = chunked.chunks.len();
        let mut embedded = Vec::with_capacity(total);
        for (idx, chunk) in chunked.chunks.iter().enumerate() {
            if chunk.content.trim().is_empty() {
                tracing::warn!("Skipping empty chunk: index={}", idx);
                continue;
            }

            tracing::info!("Embedding chunk {}/{}", idx + 1, total);
            let result = self.embed_text(model_type, &chunk.content).await?;
            embedded.push(EmbeddedChunk {
                id: chunk.id,
                content: chunk.content.clone(),
                embedding: result.embedding,
                embedding_metadata: result.metadata,
            });
        }
        if embedded.is_empty() {
            return Err(ServiceError::NoChunks);
        }

        let metadata = EmbeddingFileMetadata {
            chunk_file_id: chunk_file_id.clone(),
            source_file_name: chunked.source.file_name.clone(),
            chunk_method: chunked.chunk_method.to_string(),
            embedding_model_type: model_type,
            embedding_model_name: embedder.model_name().to_string(),
            embedding_model_dim: embedded[0].embedding.len(),
            processed_chunk_count: embedded.len(),
            total_chunk_count: total,
            embedding_time_seconds: round_to(started.elapsed().as_secs_f64(), 2),
            embedding_timestamp: Local::now().to_rfc3339(),
        };

        let embedding_file = self
            .store
            .path(Area::Embedding, &format!("{}_embedded.json", chunk_file_id));
        let file = EmbeddingFile {
            chunks: embedded,
            embedding_metadata: metadata.clone(),
        };
        self.store.write_json(&embedding_file, &file).await?;

        tracing::info!(
            "Embedded {} of {} chunks from {} with {}",
            metadata.processed_chunk_count,
            total,
            chunk_file_id,
            metadata.embedding_model_name
        );

        Ok(EmbeddingOutcome {
            message: format!(
                "Generated embeddings for {} chunks",
                metadata.processed_chunk_count
            ),
            metadata,
            embedding_file,
        })
    }

    /// Statistics of the most recently written embedding file.
    pub async fn stats(&self) -> Result<Option<EmbeddingStats>, ServiceError> {
        let files = self.store.list_json(Area::Embedding).await?;
        let Some(latest) = files.into_iter().max_by_key(|f| f.modified) else {
            return Ok(None);
        };

        let file: EmbeddingFile = self.store.read_json(&latest.path).await?;
        let metadata = file.embedding_metadata;

        Ok(Some(EmbeddingStats {
            embedding_file: latest.file_name,
            stats: EmbeddingFileStats {
                chunk_count: file.chunks.len(),
                embedding_dimensions: file.chunks.first().map_or(0, |c| c.embedding.len()),
                file_size_bytes: latest.size_bytes,
                created_at: metadata.embedding_timestamp.clone(),
                model_used: metadata.embedding_model_name.clone(),
            },
            metadata,
        }))
    }

    pub async fn read(&self, embedding_file_id: &str) -> Result<EmbeddingFile, ServiceError> {
        let not_found = || ServiceError::NotFound {
            kind: "embedding",
            id: embedding_file_id.to_string(),
        };
        if !is_safe_name(embedding_file_id) {
            return Err(not_found());
        }

        let file = self
            .store
            .find_by_id(Area::Embedding, embedding_file_id)
            .await?
            .ok_or_else(not_found)?;
        Ok(self.store.read_json(&file.path).await?)
    }
}
