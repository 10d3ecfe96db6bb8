//! Ollama HTTP client, implementing both backend traits.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;

use super::{BackendError, ChatModel, ChatTurn, EmbeddingProvider};

pub struct OllamaClient {
    client: Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success response into a typed error carrying the body text.
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Server {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let response = self
            .client
            .post(self.url("/api/embed"))
            .json(&EmbedRequest {
                model: &self.embedding_model,
                input: texts,
            })
            .send()
            .await?;

        let body: EmbedResponse = error_for_status(response).await?.json().await?;
        if body.embeddings.len() != texts.len() {
            return Err(BackendError::InvalidResponse(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&ChatRequest {
                model: &self.chat_model,
                messages,
                stream: false,
            })
            .send()
            .await?;

        let body: ChatResponse = error_for_status(response).await?.json().await?;
        Ok(body.message.content)
    }
}
