//! # randpic-api: Axum HTTP Service
//!
//! Serves random images from named libraries, re-serves a specific image
//! given its token, and reports access counters. All filesystem and token
//! logic lives in `randpic-core`; handlers here only translate between
//! HTTP and core calls.
//!
//! ## Routes
//!
//! - `/`: random image, library inferred from the `User-Agent`
//! - `/:suffix`, `/:suffix/*rest`: random image from a library;
//!   `?h=<token>` re-fetch, `&download=1` attachment
//! - `/stats?format=json|text`: access counters
//! - `/health/*`: liveness and readiness probes
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → handlers. Image routes additionally force no-cache headers.
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers: delegates to `randpic-core`.
//! - All errors map to plain-text HTTP responses via `AppError`.

pub mod error;
pub mod media;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Assemble the full application router with all routes and middleware.
///
/// Health and stats routes are merged ahead of the image routes so their
/// static paths are never read as a library suffix.
pub fn app(state: AppState) -> Router {
    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new()
        .merge(health)
        .merge(routes::stats::router())
        .merge(routes::images::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 while the image base directory is reachable.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    match tokio::fs::metadata(state.resolver.base_dir()).await {
        Ok(meta) if meta.is_dir() => Ok("ready"),
        Ok(_) => {
            tracing::warn!(
                base_dir = %state.resolver.base_dir().display(),
                "image base is not a directory"
            );
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(e) => {
            tracing::warn!(
                base_dir = %state.resolver.base_dir().display(),
                error = %e,
                "image base not accessible"
            );
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
