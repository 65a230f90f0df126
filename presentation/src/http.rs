//! HTTP surface of the relay.
//!
//! | Method | Path                          | Body                   |
//! |--------|-------------------------------|------------------------|
//! | POST   | `/chat`                       | `{message, chat_id?}`  |
//! | GET    | `/history`                    |                        |
//! | GET    | `/history/:filename`          |                        |
//! | DELETE | `/history/:filename`          |                        |
//! | POST   | `/history/:filename/resume`   |                        |
//! | POST   | `/new_chat`                   |                        |
//! | GET    | `/health`                     |                        |
//!
//! Callers are told apart by the `x-client-id` header.

use application::ChatService;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domain::{ChatError, InferenceEngine, SessionId};
use serde::{Deserialize, Serialize};
use shared::types::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const ANONYMOUS_CALLER: &str = "anonymous";
pub const FILE_NOT_FOUND: &str = "File not found";

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub chat_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoriesResponse {
    pub histories: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentResponse {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub chat_id: u64,
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Wraps [`ChatError`] so handlers can use `?` and still answer with JSON.
#[derive(Debug)]
pub struct ApiError(ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.code(), "request rejected");
        }

        let error = match &self.0 {
            ChatError::NotFound(_) => FILE_NOT_FOUND.to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error,
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
type SharedService<E> = Arc<ChatService<E>>;

pub fn router<E: InferenceEngine + 'static>(service: SharedService<E>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::<E>))
        .route("/history", get(list_histories::<E>))
        .route(
            "/history/:filename",
            get(get_history::<E>).delete(delete_history::<E>),
        )
        .route("/history/:filename/resume", post(resume_history::<E>))
        .route("/new_chat", post(new_chat::<E>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve<E: InferenceEngine + 'static>(
    service: SharedService<E>,
    addr: SocketAddr,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "chat relay listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn caller(headers: &HeaderMap) -> &str {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS_CALLER)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat_relay",
    }))
}

async fn chat<E: InferenceEngine + 'static>(
    State(service): State<SharedService<E>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let session = request
        .chat_id
        .map(|n| SessionId::new(n).ok_or_else(|| ChatError::NotFound(format!("chat {n}"))))
        .transpose()?;
    let reply = service
        .send_message(caller(&headers), &request.message, session)
        .await?;
    Ok(Json(ChatResponse { reply }))
}

async fn list_histories<E: InferenceEngine + 'static>(
    State(service): State<SharedService<E>>,
) -> ApiResult<HistoriesResponse> {
    Ok(Json(HistoriesResponse {
        histories: service.list_sessions()?,
    }))
}

async fn get_history<E: InferenceEngine + 'static>(
    State(service): State<SharedService<E>>,
    Path(filename): Path<String>,
) -> ApiResult<ContentResponse> {
    Ok(Json(ContentResponse {
        content: service.get_session(&filename)?,
    }))
}

async fn delete_history<E: InferenceEngine + 'static>(
    State(service): State<SharedService<E>>,
    Path(filename): Path<String>,
) -> ApiResult<MessageResponse> {
    Ok(Json(MessageResponse {
        message: service.delete_session(&filename).await?,
    }))
}

async fn new_chat<E: InferenceEngine + 'static>(
    State(service): State<SharedService<E>>,
    headers: HeaderMap,
) -> ApiResult<NewChatResponse> {
    let created = service.create_session(caller(&headers)).await?;
    Ok(Json(NewChatResponse {
        chat_id: created.id.get(),
        filename: created.filename,
    }))
}

async fn resume_history<E: InferenceEngine + 'static>(
    State(service): State<SharedService<E>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> ApiResult<NewChatResponse> {
    let resumed = service.resume_session(caller(&headers), &filename)?;
    Ok(Json(NewChatResponse {
        chat_id: resumed.id.get(),
        filename: resumed.filename,
    }))
}
