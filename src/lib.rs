use std::sync::{Arc, Mutex};

pub mod answer;
pub mod backend;
pub mod config;
pub mod index;
pub mod ingest;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

use backend::{BackendError, ChatModel, EmbeddingProvider, OllamaClient};
use config::AppConfig;
use index::VectorIndex;
use ingest::Ingestor;
use session::SessionStore;

/// Shared service state. The index slot is an explicit `Option`: `None` means
/// no index has been created yet, `Some` with zero rows is an empty index.
pub struct AppState {
    pub config: AppConfig,
    pub index: Mutex<Option<VectorIndex>>,
    pub sessions: SessionStore,
    pub ingestor: Ingestor,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub chat_model: Arc<dyn ChatModel>,
}

impl AppState {
    /// Production wiring: one Ollama client serves as both backends.
    pub fn new(config: AppConfig, index: Option<VectorIndex>) -> Result<Self, BackendError> {
        let ollama = Arc::new(OllamaClient::new(&config.ollama)?);
        Ok(Self::with_backends(
            config,
            index,
            ollama.clone() as Arc<dyn EmbeddingProvider>,
            ollama as Arc<dyn ChatModel>,
        ))
    }

    pub fn with_backends(
        config: AppConfig,
        index: Option<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        let ingestor = Ingestor::new(config.chunk_size, config.chunk_overlap);
        Self {
            config,
            index: Mutex::new(index),
            sessions: SessionStore::new(),
            ingestor,
            embedder,
            chat_model,
        }
    }
}
