//! # API Error Types
//!
//! Application error type implementing `axum::response::IntoResponse`.
//! Maps core errors from `randpic-core` to HTTP status codes with short
//! plain-text bodies. Bodies are fixed strings chosen per variant: paths,
//! keys and I/O details go to the log, never to the client.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use randpic_core::{ResolveError, StatsError};
use thiserror::Error;

/// Body for unknown library keys.
pub const MSG_INVALID_LIBRARY: &str = "Invalid library suffix";
/// Body for library directories failing the sandbox check.
pub const MSG_INVALID_LIBRARY_PATH: &str = "Invalid library path";
/// Body for matched files failing the post-match sandbox check.
pub const MSG_PATH_VALIDATION_FAILED: &str = "Path validation failed";
/// Body for empty libraries.
pub const MSG_NO_IMAGES: &str = "No images available";
/// Body for tokens matching no file.
pub const MSG_FILE_NOT_FOUND: &str = "File not found";
/// Body for statistics read before the first increment.
pub const MSG_STATS_UNINITIALIZED: &str = "Statistics system not initialized";
/// Body for an unparsable statistics record.
pub const MSG_STATS_INVALID: &str = "Invalid statistics data";
/// Body for every other failure.
pub const MSG_INTERNAL: &str = "Internal Server Error";

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Sandbox violation (403).
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Dependency not ready (503).
    #[error("service unavailable: {0}")]
    Unavailable(&'static str),

    /// Persisted statistics could not be parsed (500). Detail is logged.
    #[error("invalid statistics data: {0}")]
    InvalidData(String),

    /// Any other fault (500). Detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and client-facing body for this error.
    fn status_and_body(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, *msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, *msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, *msg),
            Self::InvalidData(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_STATS_INVALID),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL),
        }
    }

    /// Convert a token-lookup failure. A sandbox violation at this stage
    /// means a matched file was swapped for a link leading outside the
    /// library, which gets its own body. The locator has already logged it.
    pub fn from_lookup(err: ResolveError) -> Self {
        match err {
            ResolveError::PathEscape { .. } => Self::Forbidden(MSG_PATH_VALIDATION_FAILED),
            other => Self::from(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidLibrary(_) => Self::NotFound(MSG_INVALID_LIBRARY),
            ResolveError::PathEscape { path, root } => {
                tracing::warn!(
                    path = %path.display(),
                    root = %root.display(),
                    "security: path escaped sandbox"
                );
                Self::Forbidden(MSG_INVALID_LIBRARY_PATH)
            }
            ResolveError::NoImages(_) => Self::NotFound(MSG_NO_IMAGES),
            ResolveError::NotFound(_) => Self::NotFound(MSG_FILE_NOT_FOUND),
            ResolveError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::Uninitialized => Self::Unavailable(MSG_STATS_UNINITIALIZED),
            StatsError::Corrupt(detail) => Self::InvalidData(detail),
            StatsError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
