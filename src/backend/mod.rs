//! External model backends: text embeddings and chat completion.
//!
//! Both are traits so the retrieval chain can run against mock backends in
//! tests; the production implementation is [`OllamaClient`].

mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// One turn of a model conversation, in the wire format chat backends expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Maps texts to fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts; returns one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError>;
}

/// Produces a chat completion for an assembled message sequence.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, BackendError>;
}
