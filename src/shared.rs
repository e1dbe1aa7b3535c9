use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::room::service::RoomService;
use crate::session::SessionCoordinator;
use crate::websockets::{BroadcastRouter, ConnectionRegistry};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub router: Arc<BroadcastRouter>,
    pub coordinator: Arc<SessionCoordinator>,
}

impl AppState {
    pub fn new(room_service: Arc<RoomService>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        let router = Arc::new(BroadcastRouter::new(Arc::clone(&registry)));
        let coordinator = Arc::new(SessionCoordinator::new(
            Arc::clone(&room_service),
            Arc::clone(&registry),
            Arc::clone(&router),
        ));

        Self {
            room_service,
            registry,
            router,
            coordinator,
        }
    }
}

/// Per-request error taxonomy. None of these are process-fatal.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Distinct from the generic errors so callers can invalidate
    /// cached credentials on a bad passcode.
    #[error("Invalid pass code")]
    PasscodeMismatch,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PasscodeMismatch => {
                (StatusCode::UNAUTHORIZED, "Invalid pass code".to_string())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            // Store details are logged server-side, not returned to callers
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error".to_string(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "message": error_message
        }));

        (status, body).into_response()
    }
}
