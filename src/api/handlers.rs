//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{AdapterEventRequest, ErrorResponse, QueuedResponse};
use super::AppState;
use crate::runtime::{SessionEvent, SessionView};
use crate::state_machine::{DmState, Event};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session snapshot
        .route("/api/session", get(get_session))
        // Start or restart the task
        .route("/api/session/start", post(start_session))
        // SSE streaming of state changes and adapter commands
        .route("/api/session/stream", get(stream_session))
        // Speech adapter callbacks
        .route("/api/adapter/events", post(post_adapter_event))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.view().await)
}

async fn start_session(
    State(state): State<AppState>,
) -> Result<Json<QueuedResponse>, AppError> {
    // Any later state restarts the dialogue
    if state.session.view().await.state == DmState::Prepare {
        return Err(AppError::BadRequest(
            "Speech adapter is not ready yet".to_string(),
        ));
    }

    state
        .session
        .send_event(Event::Start)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(QueuedResponse { queued: true }))
}

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe first so nothing between snapshot and stream is lost
    let broadcast_rx = state.session.subscribe();
    let init_event = SessionEvent::Init {
        view: state.session.view().await,
        adapter: state.session.adapter().clone(),
    };
    sse_stream(init_event, broadcast_rx)
}

// ============================================================
// Speech adapter
// ============================================================

async fn post_adapter_event(
    State(state): State<AppState>,
    Json(req): Json<AdapterEventRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    tracing::debug!(event = ?req, "Adapter event");
    state
        .session
        .send_event(req.into())
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(QueuedResponse { queued: true }))
}

async fn get_version() -> &'static str {
    concat!("voice-dm ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
