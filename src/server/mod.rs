//! HTTP surface: the embedded chat page plus the JSON API driving it.
//!
//! Each interaction (upload batch, question) runs to completion within its
//! request; failures abort only that interaction and are reported as JSON
//! error bodies the page displays.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::answer::{self, AnswerError};
use crate::backend::BackendError;
use crate::index::{create_or_append, IndexError, IndexStats, VectorIndex};
use crate::ingest::IngestError;
use crate::session::Role;
use crate::AppState;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Uploads above this size are rejected by the body-limit layer.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Ingest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Answer(AnswerError::IndexAbsent) => StatusCode::CONFLICT,
            AppError::Answer(AnswerError::Backend(_)) => StatusCode::BAD_GATEWAY,
            AppError::Answer(AnswerError::Index(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log::error!("request failed: {self}");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/documents", post(upload_documents))
        .route("/api/chat", post(chat))
        .route("/api/status", get(status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.bind_addr.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct UploadResponse {
    files: usize,
    segments: usize,
}

/// Ingest a multipart batch of PDFs, sequentially. The first failing file
/// aborts the batch; segments committed for earlier files stay in the index
/// (no rollback).
async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut files = 0;
    let mut total_segments = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let segments = state.ingestor.process_pdf(&file_name, &bytes)?;
        files += 1;
        if segments.is_empty() {
            log::warn!("{file_name}: no extractable text");
            continue;
        }

        let texts: Vec<String> = segments.iter().map(|s| s.content.clone()).collect();
        let embeddings = state.embedder.embed(&texts).await?;

        // Lock scope kept free of await points.
        {
            let mut guard = state.index.lock().unwrap_or_else(|e| e.into_inner());
            let existing = guard.take();
            match create_or_append(existing, &state.config.data_dir, &segments, &embeddings) {
                Ok(index) => *guard = Some(index),
                Err(e) => {
                    // The handle was consumed; re-open from disk so later
                    // requests still see whatever was committed.
                    *guard = match VectorIndex::open(&state.config.data_dir) {
                        Ok(reopened) => reopened,
                        Err(open_err) => {
                            log::error!(
                                "failed to re-open index after append error: {open_err}"
                            );
                            None
                        }
                    };
                    return Err(e.into());
                }
            }
        }
        total_segments += segments.len();
    }

    Ok(Json(UploadResponse {
        files,
        segments: total_segments,
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    session_id: Option<Uuid>,
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    session_id: Uuid,
    answer: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(AppError::BadRequest("question must not be empty".to_string()));
    }

    let session_id = state.sessions.ensure(request.session_id);
    // History snapshot excludes the question being asked.
    let history = state.sessions.history(session_id);
    state.sessions.append(session_id, Role::User, question.clone());

    let reply = answer::answer(
        &question,
        &history,
        &state.index,
        state.embedder.as_ref(),
        state.chat_model.as_ref(),
        state.config.top_k,
    )
    .await?;

    state
        .sessions
        .append(session_id, Role::Assistant, reply.clone());

    Ok(Json(ChatResponse {
        session_id,
        answer: reply,
    }))
}

#[derive(Serialize)]
struct StatusResponse {
    model: String,
    models: Vec<String>,
    initialized: bool,
    stats: Option<IndexStats>,
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let stats = {
        let guard = state.index.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(index) => Some(index.stats()?),
            None => None,
        }
    };

    let model = state.config.ollama.chat_model.clone();
    Ok(Json(StatusResponse {
        models: vec![model.clone()],
        model,
        initialized: stats.is_some(),
        stats,
    }))
}
