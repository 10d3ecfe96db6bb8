//! Answer generation: retrieve relevant segments, assemble a grounded prompt,
//! call the chat model. Each stage is a separate function so it can be tested
//! against mock backends.

use std::sync::Mutex;

use thiserror::Error;

use crate::backend::{BackendError, ChatModel, ChatTurn, EmbeddingProvider};
use crate::index::{IndexError, ScoredSegment, VectorIndex};
use crate::session::ChatMessage;

/// Fixed persona and response-language policy for every answer.
pub const SYSTEM_PERSONA: &str = "Você é uma assistente virtual. \
Você sempre irá responder no idioma português, de forma formal e descontraída.";

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("No documents have been ingested yet")]
    IndexAbsent,
}

/// Answer a question against the index, grounded in retrieved segments and
/// aware of the session history. Does not mutate the index.
pub async fn answer(
    question: &str,
    history: &[ChatMessage],
    index: &Mutex<Option<VectorIndex>>,
    embedder: &dyn EmbeddingProvider,
    model: &dyn ChatModel,
    top_k: usize,
) -> Result<String, AnswerError> {
    let segments = retrieve(question, index, embedder, top_k).await?;
    let turns = build_prompt(&segments, history, question);
    Ok(model.complete(&turns).await?)
}

/// Embed the question and return the top-k most similar stored segments.
pub async fn retrieve(
    question: &str,
    index: &Mutex<Option<VectorIndex>>,
    embedder: &dyn EmbeddingProvider,
    top_k: usize,
) -> Result<Vec<ScoredSegment>, AnswerError> {
    // Bail out before the embedding round-trip when there is nothing to
    // search, so an absent index is reported as such even if the embedding
    // backend is down.
    {
        let guard = index.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            return Err(AnswerError::IndexAbsent);
        }
    }

    let texts = vec![question.to_string()];
    let mut embeddings = embedder.embed(&texts).await?;
    let query = embeddings
        .pop()
        .ok_or_else(|| BackendError::InvalidResponse("empty embedding batch".to_string()))?;

    // Lock scope kept free of await points.
    let guard = index.lock().unwrap_or_else(|e| e.into_inner());
    let index = guard.as_ref().ok_or(AnswerError::IndexAbsent)?;
    Ok(index.search(&query, top_k)?)
}

/// Assemble the message sequence: persona-with-context system turn, then the
/// session history in original order, then the current question.
pub fn build_prompt(
    segments: &[ScoredSegment],
    history: &[ChatMessage],
    question: &str,
) -> Vec<ChatTurn> {
    let context = segments
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::new(
        "system",
        format!("{SYSTEM_PERSONA}\nContexto: {context}"),
    ));
    for message in history {
        turns.push(ChatTurn::new(message.role.as_str(), message.content.clone()));
    }
    turns.push(ChatTurn::new("user", question));
    turns
}
