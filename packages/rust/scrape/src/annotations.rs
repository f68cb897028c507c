//! Annotation scraping: pin id -> related keyword annotations.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use keywordscout_shared::{Annotation, HttpConfig, KeywordScoutError, Result};

use crate::http::{FetchError, FetchErrorKind, HttpClient};

static PIN_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

const FIELD_SET_KEY: &str = "auth_web_main_pin";

// ---------------------------------------------------------------------------
// ScrapeError
// ---------------------------------------------------------------------------

/// Per-id scrape failure. Collected next to successes, never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    #[error("invalid pin id format")]
    InvalidId,

    #[error("request timed out")]
    Timeout,

    #[error("HTTP error, status {status}")]
    HttpError { status: u16 },

    #[error("no resource data in response")]
    MissingData,

    #[error("{message}")]
    Unknown { message: String },
}

impl ScrapeError {
    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidId => "invalid_id",
            Self::Timeout => "timeout",
            Self::HttpError { .. } => "http_error",
            Self::MissingData => "missing_data",
            Self::Unknown { .. } => "unknown",
        }
    }
}

impl From<FetchError> for ScrapeError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FetchErrorKind::Timeout => Self::Timeout,
            FetchErrorKind::Status(status) => Self::HttpError { status },
            _ => Self::Unknown {
                message: err.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// AnnotationScraper
// ---------------------------------------------------------------------------

/// Fetches a pin's resource record and extracts its linked annotations.
#[derive(Debug, Clone)]
pub struct AnnotationScraper {
    http: HttpClient,
    base_url: Url,
    timeout: Duration,
}

impl AnnotationScraper {
    pub fn new(http: HttpClient, config: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&config.annotation_base_url).map_err(|e| {
            KeywordScoutError::config(format!(
                "invalid annotation_base_url '{}': {e}",
                config.annotation_base_url
            ))
        })?;

        Ok(Self {
            http,
            base_url,
            timeout: config.scrape_timeout,
        })
    }

    /// Resource lookup URL for a validated pin id.
    pub fn lookup_url(&self, id: &str) -> std::result::Result<Url, ScrapeError> {
        let mut url =
            self.base_url
                .join("resource/PinResource/get/")
                .map_err(|e| ScrapeError::Unknown {
                    message: format!("could not build lookup url: {e}"),
                })?;

        let data = serde_json::json!({
            "options": {
                "id": id,
                "field_set_key": FIELD_SET_KEY,
                "noCache": true,
                "fetch_visual_search_objects": true,
            },
            "context": {},
        });

        url.query_pairs_mut()
            .append_pair("source_url", &format!("/pin/{id}/"))
            .append_pair("data", &data.to_string());
        Ok(url)
    }

    /// Scrape the annotations attached to pin `id`.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn scrape(&self, id: &str) -> std::result::Result<Vec<Annotation>, ScrapeError> {
        if !PIN_ID.is_match(id) {
            return Err(ScrapeError::InvalidId);
        }

        let url = self.lookup_url(id)?;
        let payload: Value = self.http.get_json(&url, self.timeout).await?;
        let annotations = extract_annotations(&payload)?;

        debug!(count = annotations.len(), "scraped annotations");
        Ok(annotations)
    }
}

/// Pull `resource_response.data.pin_join.annotations_with_links` out of a
/// resource payload. A missing `data` object is an error; a record without
/// annotations yields an empty list.
pub fn extract_annotations(payload: &Value) -> std::result::Result<Vec<Annotation>, ScrapeError> {
    let data = match payload.pointer("/resource_response/data") {
        Some(data) if !data.is_null() => data,
        _ => return Err(ScrapeError::MissingData),
    };

    let entries: Vec<&Value> = match data.pointer("/pin_join/annotations_with_links") {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.get("url").and_then(Value::as_str).unwrap_or_default();
            let name = entry.get("name").and_then(Value::as_str).unwrap_or_default();
            if url.is_empty() && name.is_empty() {
                None
            } else {
                Some(Annotation::new(url, name))
            }
        })
        .collect())
}
