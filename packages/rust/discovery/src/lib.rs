//! Candidate discovery: seed keyword -> ordered content-source ids.
//!
//! The pipeline treats the search backend as a black box behind the
//! [`CandidateSource`] trait. [`PinterestSearch`] queries the public pin
//! search resource; [`StaticCandidates`] serves a fixed list.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use keywordscout_scrape::HttpClient;
use keywordscout_shared::{HttpConfig, KeywordScoutError, Result};

/// Timeout for one search request.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CandidateSource
// ---------------------------------------------------------------------------

/// Resolves a keyword into content-source ids, best match first.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Return at most `limit` ids for `keyword`. A failure here is a
    /// request-level failure: the pipeline has nothing to rank without it.
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<String>>;
}

/// A fixed id list, truncated to the requested limit.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    ids: Vec<String>,
}

impl StaticCandidates {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CandidateSource for StaticCandidates {
    async fn search(&self, _keyword: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self.ids.iter().take(limit).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// PinterestSearch
// ---------------------------------------------------------------------------

/// Pin search over the site's resource API.
#[derive(Debug, Clone)]
pub struct PinterestSearch {
    http: HttpClient,
    base_url: Url,
    timeout: Duration,
}

impl PinterestSearch {
    pub fn new(http: HttpClient, config: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&config.search_base_url).map_err(|e| {
            KeywordScoutError::config(format!(
                "invalid search_base_url '{}': {e}",
                config.search_base_url
            ))
        })?;

        Ok(Self {
            http,
            base_url,
            timeout: SEARCH_TIMEOUT,
        })
    }

    /// Search resource URL for `keyword`.
    fn search_url(&self, keyword: &str, limit: usize) -> Result<Url> {
        let mut url = self
            .base_url
            .join("resource/BaseSearchResource/get/")
            .map_err(|e| KeywordScoutError::config(format!("invalid search url: {e}")))?;

        let data = serde_json::json!({
            "options": {
                "query": keyword,
                "scope": "pins",
                "page_size": limit,
            },
            "context": {},
        });

        url.query_pairs_mut()
            .append_pair("source_url", &format!("/search/pins/?q={keyword}"))
            .append_pair("data", &data.to_string());
        Ok(url)
    }
}

#[async_trait]
impl CandidateSource for PinterestSearch {
    #[instrument(skip_all, fields(keyword = %keyword, limit = limit))]
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = self.search_url(keyword, limit)?;
        let payload: Value = self.http.get_json(&url, self.timeout).await?;
        let ids = parse_search_ids(&payload, limit)?;

        info!(count = ids.len(), "candidate ids resolved");
        Ok(ids)
    }
}

/// Read `resource_response.data.results[].id`. Ids may be strings or
/// integers; results without one are skipped.
fn parse_search_ids(payload: &Value, limit: usize) -> Result<Vec<String>> {
    let results = payload
        .pointer("/resource_response/data/results")
        .and_then(Value::as_array)
        .ok_or_else(|| KeywordScoutError::parse("search response has no results array"))?;

    let ids: Vec<String> = results
        .iter()
        .filter_map(|result| match result.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        })
        .take(limit)
        .collect();

    debug!(returned = results.len(), kept = ids.len(), "parsed search results");
    Ok(ids)
}
