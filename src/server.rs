//! JSON HTTP API for document upload and chat.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner |
//! | `POST` | `/chat` | Safety check, retrieval, answer |
//! | `POST` | `/upload-document` | Multipart `file` upload |
//! | `GET`  | `/documents` | List registered documents |
//! | `DELETE` | `/documents/{id}` | Remove a document and its chunks |
//! | `DELETE` | `/sessions/{id}` | Forget a conversation |
//! | `GET`  | `/health` | Document and session counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `payload_too_large` (413), `internal` (500). Malformed JSON bodies are
//! reported as `bad_request` with the decoder's message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser UI on
//! another port can call the API.

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::extract::mime_from_path;
use crate::generation::{create_generator, ImageInput, TextGenerator};
use crate::ingest::DocumentProcessor;
use crate::memory::ChatMemory;
use crate::models::{Document, Role};
use crate::rag::{RagVariant, Retriever};
use crate::safety::ContentSafetyGuard;
use crate::store::{InMemoryStore, Store};

/// Shared application state. Created once at startup and cloned into
/// each handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    retriever: Arc<Retriever>,
    processor: Arc<DocumentProcessor>,
    memory: Arc<ChatMemory>,
    guard: ContentSafetyGuard,
}

impl AppState {
    /// Wire up an empty store and memory around `generator`.
    pub fn new(config: Config, generator: Arc<dyn TextGenerator>) -> Self {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let retriever = Retriever::new(
            store.clone(),
            generator.clone(),
            config.retrieval.clone(),
        );
        let processor = DocumentProcessor::new(config.chunking.clone(), generator);
        let memory = ChatMemory::new(config.memory.max_messages);

        Self {
            config: Arc::new(config),
            store,
            retriever: Arc::new(retriever),
            processor: Arc::new(processor),
            memory: Arc::new(memory),
            guard: ContentSafetyGuard::new(),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let generator: Arc<dyn TextGenerator> = Arc::from(create_generator(&config.generation)?);
        Ok(Self::new(config.clone(), generator))
    }
}

/// Build the router with all routes and layers attached.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        .route("/", get(handle_root))
        .route("/chat", post(handle_chat))
        .route("/upload-document", post(handle_upload))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/sessions/{id}", delete(handle_clear_session))
        .route("/health", get(handle_health))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        provider = %config.generation.provider,
        "docchat server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Keep the status axum assigns (413 for an oversize upload, 400 otherwise).
fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "bad_request"
    };
    AppError {
        status,
        code,
        message: err.body_text(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "docchat document chat API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "features": [
            "Document upload and chunking",
            "Keyword-based search",
            "Multiple RAG variants",
            "Content safety guardrails"
        ]
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    session_id: String,
    #[serde(default)]
    document_ids: Vec<String>,
    #[serde(default)]
    rag_variant: RagVariant,
    #[serde(default)]
    image_data: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
    timestamp: String,
    sources: Vec<String>,
    is_rejected: bool,
    rejection_reason: Option<String>,
}

/// Rejected messages get an empty response and are neither answered nor
/// remembered.
async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    if let Err(rejection) = state.guard.check(&req.message) {
        tracing::info!(session_id = %req.session_id, reason = rejection.reason, "message rejected");
        return Ok(Json(ChatResponse {
            response: String::new(),
            session_id: req.session_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            sources: Vec::new(),
            is_rejected: true,
            rejection_reason: Some(rejection.reason.to_string()),
        }));
    }

    let image = req
        .image_data
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(ImageInput::from_base64)
        .transpose()
        .map_err(|e| bad_request(format!("invalid image_data: {}", e)))?;

    let history = state.memory.history(&req.session_id);
    let answer = state
        .retriever
        .process_query(
            req.rag_variant,
            &req.message,
            &req.document_ids,
            &history,
            image.as_ref(),
        )
        .await
        .map_err(internal)?;

    state
        .memory
        .add_message(&req.session_id, Role::User, req.message.as_str());
    state
        .memory
        .add_message(&req.session_id, Role::Assistant, answer.response.as_str());

    Ok(Json(ChatResponse {
        response: answer.response,
        session_id: req.session_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
        sources: answer.sources,
        is_rejected: false,
        rejection_reason: None,
    }))
}

// ============ POST /upload-document ============

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    filename: String,
    #[serde(rename = "type")]
    kind: &'static str,
    chunk_count: usize,
    content_preview: String,
    status: &'static str,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = match field.content_type() {
            Some(ct) if ct != "application/octet-stream" => ct.to_string(),
            _ => mime_from_path(&filename).to_string(),
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let document = state
            .processor
            .ingest(state.store.as_ref(), &bytes, &filename, &content_type)
            .await
            .map_err(internal)?;

        return Ok(Json(UploadResponse {
            document_id: document.id,
            filename: document.name,
            kind: document.kind.as_str(),
            chunk_count: document.chunk_count,
            content_preview: document.content_preview,
            status: "success",
        }));
    }

    Err(bad_request("multipart field 'file' is required"))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentList {
    documents: Vec<Document>,
    count: usize,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentList>, AppError> {
    let documents = state.store.list_documents().await.map_err(internal)?;
    Ok(Json(DocumentList {
        count: documents.len(),
        documents,
    }))
}

// ============ DELETE /documents/{id} ============

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.store.delete_document(&id).await.map_err(internal)? {
        Some(document) => {
            tracing::info!(document_id = %id, "document deleted");
            Ok(Json(serde_json::json!({
                "status": "deleted",
                "document_id": id,
                "filename": document.name,
            })))
        }
        None => Err(not_found("Document not found")),
    }
}

// ============ DELETE /sessions/{id} ============

async fn handle_clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.memory.clear_session(&id) {
        Ok(Json(serde_json::json!({ "status": "cleared", "session_id": id })))
    } else {
        Err(not_found("Session not found"))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    documents_count: usize,
    active_sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "healthy",
        documents_count: state.store.document_count().await.map_err(internal)?,
        active_sessions: state.memory.session_count(),
    }))
}
