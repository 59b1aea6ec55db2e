use crate::chunks::ChunkService;
use crate::config::Config;
use crate::embedding::{EmbedderRegistry, EmbeddingService};
use crate::loader::DocumentLoader;
use crate::storage::FileStore;
use crate::vector_store::VectorStore;
use crate::views::ViewRouter;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: FileStore,
    pub loader: DocumentLoader,
    pub chunks: ChunkService,
    pub embeddings: EmbeddingService,
    pub vectors: VectorStore,
    pub views: ViewRouter,
}

impl AppState {
    pub fn new(config: Config, store: FileStore, registry: Arc<EmbedderRegistry>) -> Self {
        let embeddings = EmbeddingService::new(store.clone(), registry);
        let views = ViewRouter::new(&config.app_base_url, config.app_history_mode);
        tracing::info!(
            "Front-end views served under {} ({} history)",
            views.base(),
            views.mode()
        );

        Self {
            loader: DocumentLoader::new(store.clone()),
            chunks: ChunkService::new(store.clone()),
            vectors: VectorStore::new(store.clone(), embeddings.clone()),
            views,
            embeddings,
            store,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over a scratch directory with a deterministic 8-dimensional embedder.
    pub async fn for_tests() -> (tempfile::TempDir, Self) {
        Self::for_tests_with(|_| {}).await
    }

    pub async fn for_tests_with(adjust: impl FnOnce(&mut Config)) -> (tempfile::TempDir, Self) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_tests(dir.path());
        adjust(&mut config);
        let store = FileStore::from_config(&config).await.unwrap();
        let state = Self::new(config, store, crate::embedding::testing::registry(8));
        (dir, state)
    }
}
