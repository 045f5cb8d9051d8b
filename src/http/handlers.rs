use super::state::AppState;
use crate::error::{ErrorKind, StudioError, StudioResult};
use crate::host::StreamInfo;
use crate::ui::Notice;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct CaptureStartedResponse {
    pub status: String,
    pub stream: StreamInfo,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

// ============================================================================
// Helpers
// ============================================================================

fn status_code(err: &StudioError) -> StatusCode {
    match err {
        StudioError::Unauthenticated => StatusCode::UNAUTHORIZED,
        StudioError::PermissionDenied => StatusCode::FORBIDDEN,
        StudioError::DeviceUnavailable(_) | StudioError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        StudioError::CodecUnsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StudioError::InvalidState(_) | StudioError::NothingToExport => StatusCode::CONFLICT,
        StudioError::Transport(_) => StatusCode::BAD_GATEWAY,
        StudioError::Host(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(action: &str, err: StudioError) -> Response {
    error!("Failed to {}: {}", action, err);
    (
        status_code(&err),
        Json(ErrorResponse {
            error: format!("Failed to {}: {}", action, err),
            kind: err.kind(),
        }),
    )
        .into_response()
}

fn ack(result: StudioResult<()>, action: &str, status: &str) -> Response {
    match result {
        Ok(()) => {
            info!("{} ok", action);
            (
                StatusCode::OK,
                Json(AckResponse {
                    status: status.to_string(),
                    message: format!("{} ok", action),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(action, e),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(State(state): State<AppState>) -> Response {
    ack(state.studio.sign_in().await, "sign in", "signed_in")
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>) -> Response {
    ack(state.studio.sign_out().await, "sign out", "signed_out")
}

/// POST /capture/start
/// Request camera and microphone; resolves once the host answers
pub async fn start_capture(State(state): State<AppState>) -> Response {
    match state.studio.start_capture().await {
        Ok(stream) => {
            info!("Capture started: stream {}", stream.id);
            (
                StatusCode::OK,
                Json(CaptureStartedResponse {
                    status: "active".to_string(),
                    stream,
                }),
            )
                .into_response()
        }
        Err(e) => error_response("start capture", e),
    }
}

/// POST /capture/stop
pub async fn stop_capture(State(state): State<AppState>) -> Response {
    ack(state.studio.stop_capture().await, "stop capture", "idle")
}

/// POST /record/start
pub async fn start_recording(State(state): State<AppState>) -> Response {
    ack(state.studio.start_recording().await, "start recording", "recording")
}

/// POST /record/stop
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    ack(state.studio.stop_recording().await, "stop recording", "stopping")
}

/// POST /record/export
/// Upload (if configured) and save the finished recording
pub async fn export_recording(State(state): State<AppState>) -> Response {
    match state.studio.export().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => error_response("export recording", e),
    }
}

/// POST /canvas/resize
pub async fn resize_canvas(
    State(state): State<AppState>,
    Json(req): Json<ResizeRequest>,
) -> Response {
    ack(
        state.studio.resize_canvas(req.width, req.height).await,
        "resize canvas",
        "resized",
    )
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Response {
    match state.studio.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response("read status", e),
    }
}

/// GET /notices
pub async fn get_notices(State(state): State<AppState>) -> impl IntoResponse {
    let notices: Vec<Notice> = state.ui.snapshot().notices;
    (StatusCode::OK, Json(notices))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
