//! HTTP surface for Writer Helper.
//!
//! Each browser (or API client) creates a session, uploads an optional
//! document, and submits turns. Every response carries the full transcript so
//! the client can re-render it after each turn.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Create a session |
//! | `GET`    | `/sessions/{id}` | Current mode, document and transcript |
//! | `DELETE` | `/sessions/{id}` | End the session |
//! | `POST`   | `/sessions/{id}/turns` | Submit `{ "text": ... }` |
//! | `POST`   | `/sessions/{id}/document?name=` | Upload raw bytes; type from `Content-Type` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "turn text must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `unsupported_media_type` (415), `unprocessable` (422), `internal` (500).

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::dispatch::{DispatchError, Dispatcher, UploadOutcome};
use crate::index::ScoredChunk;
use crate::ingest::IngestError;
use crate::models::{LoadedDocument, Turn};
use crate::session::{Mode, Session, SessionRegistry};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            dispatcher.config().session.greeting.clone(),
        ));
        Self {
            sessions,
            dispatcher,
        }
    }

    fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
        let uuid = Uuid::parse_str(id).map_err(|_| not_found(format!("no session: {}", id)))?;
        self.sessions
            .get(&uuid)
            .ok_or_else(|| not_found(format!("no session: {}", id)))
    }
}

/// Build the router. Split out from [`run_server`] so tests can drive it
/// in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_end_session),
        )
        .route("/sessions/{id}/turns", post(handle_submit))
        .route("/sessions/{id}/document", post(handle_upload))
        // Upload size is left to the runtime.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `bind` and serves until the process exits.
pub async fn run_server(bind: &str, dispatcher: Dispatcher) -> anyhow::Result<()> {
    let app = router(AppState::new(dispatcher));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "writer-helper listening");
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

#[derive(Debug)]
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let (status, code) = match &err {
            DispatchError::EmptyTurn => (StatusCode::BAD_REQUEST, "bad_request"),
            DispatchError::Ingest(IngestError::UnsupportedContentType(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type")
            }
            DispatchError::Ingest(IngestError::Staging(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            DispatchError::Ingest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable"),
            DispatchError::Extraction(_) | DispatchError::Index(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ Views ============

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    mode: Mode,
    document: Option<LoadedDocument>,
    transcript: Vec<Turn>,
    /// Markdown rendering of `transcript`.
    rendered: String,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        Self {
            id: session.id(),
            mode: session.mode(),
            document: session.document().cloned(),
            transcript: session.conversation().all().to_vec(),
            rendered: session.conversation().render(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Sessions ============

async fn handle_create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let (_, session) = state.sessions.create();
    let session = session.lock().await;
    (StatusCode::CREATED, Json(SessionView::of(&session)))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&id)?;
    let session = session.lock().await;
    Ok(Json(SessionView::of(&session)))
}

async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let uuid = Uuid::parse_str(&id).map_err(|_| not_found(format!("no session: {}", id)))?;
    if state.sessions.remove(&uuid) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no session: {}", id)))
    }
}

// ============ POST /sessions/{id}/turns ============

#[derive(Deserialize)]
struct SubmitRequest {
    text: String,
}

/// A document passage the reply was grounded on.
#[derive(Serialize)]
struct SourceView {
    fragment: usize,
    chunk: i64,
    score: f64,
    text: String,
}

impl From<ScoredChunk> for SourceView {
    fn from(s: ScoredChunk) -> Self {
        Self {
            fragment: s.chunk.fragment_index,
            chunk: s.chunk.chunk_index,
            score: s.score,
            text: s.chunk.text,
        }
    }
}

#[derive(Serialize)]
struct SubmitResponse {
    reply: Turn,
    sources: Vec<SourceView>,
    session: SessionView,
}

async fn handle_submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let session = state.session(&id)?;
    let mut session = session.lock().await;
    let reply = state.dispatcher.submit(&mut session, &req.text).await?;
    Ok(Json(SubmitResponse {
        reply: reply.turn,
        sources: reply.sources.into_iter().map(SourceView::from).collect(),
        session: SessionView::of(&session),
    }))
}

// ============ POST /sessions/{id}/document ============

#[derive(Deserialize)]
struct UploadParams {
    name: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    outcome: UploadOutcome,
    session: SessionView,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let name = params.name.unwrap_or_else(|| "document".to_string());

    let session = state.session(&id)?;
    let mut session = session.lock().await;
    let outcome = state
        .dispatcher
        .upload(&mut session, &name, &body, &content_type)
        .await?;
    Ok(Json(UploadResponse {
        outcome,
        session: SessionView::of(&session),
    }))
}
