//! # Statistics API
//!
//! `GET /stats?format=json|text` reports the access counters. The format is
//! matched case-insensitively; anything other than `text` gets JSON. When
//! `format` is repeated the last value wins.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use randpic_core::StatsReport;

use crate::error::AppError;
use crate::state::AppState;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Text,
}

impl ReportFormat {
    /// The last `format` parameter decides.
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        let format = pairs
            .iter()
            .rev()
            .find(|(key, _)| key == "format")
            .map(|(_, value)| value.as_str());
        Self::from_query(format)
    }

    fn from_query(format: Option<&str>) -> Self {
        match format {
            Some(f) if f.eq_ignore_ascii_case("text") => Self::Text,
            _ => Self::Json,
        }
    }
}

/// Build the statistics router.
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

/// GET /stats: current counters.
async fn get_stats(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let stats = state.stats.clone();
    let record = tokio::task::spawn_blocking(move || stats.read()).await??;
    let report = StatsReport::from(record);

    let response = match ReportFormat::from_pairs(&pairs) {
        ReportFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            report.to_text(),
        )
            .into_response(),
        ReportFormat::Json => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            report.to_json_pretty()?,
        )
            .into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selection() {
        assert_eq!(ReportFormat::from_query(None), ReportFormat::Json);
        assert_eq!(ReportFormat::from_query(Some("json")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_query(Some("text")), ReportFormat::Text);
        assert_eq!(ReportFormat::from_query(Some("TEXT")), ReportFormat::Text);
        assert_eq!(ReportFormat::from_query(Some("xml")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_query(Some("")), ReportFormat::Json);
    }

    #[test]
    fn last_format_parameter_wins() {
        let pairs = |raw: &[(&str, &str)]| -> Vec<(String, String)> {
            raw.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        assert_eq!(
            ReportFormat::from_pairs(&pairs(&[("format", "json"), ("format", "text")])),
            ReportFormat::Text
        );
        assert_eq!(
            ReportFormat::from_pairs(&pairs(&[("format", "text"), ("format", "json")])),
            ReportFormat::Json
        );
        assert_eq!(ReportFormat::from_pairs(&[]), ReportFormat::Json);
    }
}
