//! # Image Delivery API
//!
//! Serves a random image from a library, or re-serves a specific one when
//! the request carries its token.
//!
//! - `GET /`: library inferred from the `User-Agent`.
//! - `GET /:suffix` and `GET /:suffix/*rest`: random image from the
//!   library named by the first path segment; further segments are ignored.
//! - `?h=<token>`: the image whose token matches; not counted.
//! - `?h=<token>&download=1`: the same, as an attachment.
//!
//! Directory scans, stats updates and lock waits are blocking, so the
//! selection step runs on the blocking pool. That step also opens the file
//! from its validated path; the body is then streamed from the open handle.
//!
//! A repeated query parameter takes its last value. A path that is not
//! valid UTF-8 is answered as an unknown library.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use randpic_core::{locate, pick_random, ImageCandidate};
use tokio_util::io::ReaderStream;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::{AppError, MSG_INVALID_LIBRARY};
use crate::media;
use crate::state::AppState;

/// `Cache-Control` value sent with every image response.
pub const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Library served to mobile clients on `GET /`.
pub const MOBILE_LIBRARY: &str = "pe";
/// Library served to every other client on `GET /`.
pub const DESKTOP_LIBRARY: &str = "pc";

const MOBILE_MARKERS: &[&str] = &["mobile", "android", "iphone"];
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Query parameters accepted on image routes.
///
/// Built from the raw pairs so a repeated parameter resolves to its last
/// value instead of rejecting the request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageQuery {
    /// Token of a previously served image. Empty counts as absent.
    pub h: Option<String>,
    /// Any value requests an attachment response.
    pub download: Option<String>,
}

impl ImageQuery {
    /// Collect the recognised parameters; later occurrences win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "h" => query.h = Some(value),
                "download" => query.download = Some(value),
                _ => {}
            }
        }
        query
    }

    fn token(&self) -> Option<&str> {
        self.h.as_deref().filter(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inline,
    Attachment,
}

/// Build the image router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(inferred_image))
        .route("/:suffix", get(library_image))
        .route("/:suffix/*rest", get(nested_library_image))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_STORE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
}

/// Pick the library for a request without a suffix.
pub fn infer_library_key(user_agent: Option<&str>) -> &'static str {
    let is_mobile = user_agent.is_some_and(|ua| {
        let ua = ua.to_ascii_lowercase();
        MOBILE_MARKERS.iter().any(|m| ua.contains(m))
    });
    if is_mobile {
        MOBILE_LIBRARY
    } else {
        DESKTOP_LIBRARY
    }
}

/// GET /: image from the library matching the client's device class.
async fn inferred_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let suffix = infer_library_key(user_agent);
    serve(state, suffix.to_string(), ImageQuery::from_pairs(pairs)).await
}

/// GET /:suffix: image from the named library.
async fn library_image(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let Path(suffix) = path.map_err(unknown_library)?;
    serve(state, suffix, ImageQuery::from_pairs(pairs)).await
}

/// GET /:suffix/*rest: as `/:suffix`.
async fn nested_library_image(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let Path((suffix, _rest)) = path.map_err(unknown_library)?;
    serve(state, suffix, ImageQuery::from_pairs(pairs)).await
}

/// A path that does not decode to UTF-8 cannot name a library.
fn unknown_library(rejection: PathRejection) -> AppError {
    tracing::debug!(error = %rejection, "undecodable library path");
    AppError::NotFound(MSG_INVALID_LIBRARY)
}

async fn serve(state: AppState, suffix: String, query: ImageQuery) -> Result<Response, AppError> {
    let token = query.token().map(str::to_owned);
    let disposition = match (&token, &query.download) {
        (Some(_), Some(_)) => Disposition::Attachment,
        _ => Disposition::Inline,
    };

    let image = tokio::task::spawn_blocking(move || select(&state, &suffix, token.as_deref()))
        .await??;

    let content_type = media::content_type(&image.head, image.candidate.extension());
    tracing::debug!(
        file = %image.candidate.file_name(),
        content_type,
        size = image.len,
        attachment = disposition == Disposition::Attachment,
        "serving image"
    );

    let mut headers = image_headers(
        image.candidate.file_name(),
        content_type,
        disposition,
        Utc::now(),
    )?;
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(image.len));

    let stream = ReaderStream::new(tokio::fs::File::from_std(image.file));
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

/// A chosen image, opened from its validated path.
struct OpenedImage {
    candidate: ImageCandidate,
    file: File,
    /// Leading bytes, for content sniffing.
    head: Vec<u8>,
    len: u64,
}

impl OpenedImage {
    /// Open the validated target and read its signature. The file is
    /// rewound so the body is streamed from the start in a single pass.
    fn open(candidate: ImageCandidate) -> std::io::Result<Self> {
        let mut file = File::open(candidate.resolved_path())?;
        let len = file.metadata()?.len();
        let mut head = Vec::with_capacity(media::SNIFF_LEN);
        (&mut file).take(media::SNIFF_LEN as u64).read_to_end(&mut head)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            candidate,
            file,
            head,
            len,
        })
    }
}

/// Resolve the library, choose the file and open it, all before returning
/// to the async side. A random pick is counted once the file is open; a
/// token lookup is not counted.
fn select(state: &AppState, suffix: &str, token: Option<&str>) -> Result<OpenedImage, AppError> {
    let library = state.resolver.resolve(suffix)?;
    match token {
        None => {
            let image = OpenedImage::open(pick_random(&library)?)?;
            state.stats.increment(library.key().as_str())?;
            tracing::info!(
                library = %library.key(),
                file = %image.candidate.file_name(),
                "random image"
            );
            Ok(image)
        }
        Some(token) => {
            let candidate =
                locate(&library, token, &state.token_key).map_err(AppError::from_lookup)?;
            let image = OpenedImage::open(candidate)?;
            tracing::info!(
                library = %library.key(),
                file = %image.candidate.file_name(),
                "token lookup"
            );
            Ok(image)
        }
    }
}

fn image_headers(
    file_name: &str,
    content_type: &'static str,
    disposition: Disposition,
    now: DateTime<Utc>,
) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));

    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let value = format!("{kind}; filename=\"{}\"", quoted_file_name(file_name));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&value)
            .map_err(|e| AppError::Internal(format!("content-disposition: {e}")))?,
    );

    if disposition == Disposition::Inline {
        insert_date(&mut headers, header::LAST_MODIFIED, now);
        insert_date(&mut headers, header::EXPIRES, now - chrono::Duration::hours(1));
    }
    Ok(headers)
}

fn insert_date(headers: &mut HeaderMap, name: HeaderName, at: DateTime<Utc>) {
    // IMF-fixdate is plain ASCII, so this never fails.
    if let Ok(value) = HeaderValue::from_str(&at.format(HTTP_DATE_FORMAT).to_string()) {
        headers.insert(name, value);
    }
}

/// Make a filename safe inside a quoted header parameter.
fn quoted_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
