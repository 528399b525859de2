use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::evernote::EvernoteError;

/// Unified error type for the remarker service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Request Errors ──────────────────────────────────────────────────
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    // ── Crypto Errors ───────────────────────────────────────────────────
    #[error("Crypto error: {0}")]
    Crypto(String),

    // ── Upstream ────────────────────────────────────────────────────────
    #[error(transparent)]
    Evernote(#[from] EvernoteError),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        AppError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Evernote(_) => StatusCode::BAD_GATEWAY,
            AppError::Crypto(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Errors are shown to people in a browser tab (the OAuth callback window),
/// so the body is plain text rather than JSON.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, self.to_string()).into_response()
    }
}
