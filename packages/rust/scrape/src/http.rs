//! Rate-limited, retrying HTTP client for the scraped site.
//!
//! Every attempt (retries included) passes through the shared
//! [`RateLimiter`] and carries a fresh set of rotated browser headers.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use keywordscout_shared::{KeywordScoutError, Result, RetryPolicy};

use crate::headers::HeaderRotator;
use crate::limiter::RateLimiter;
use crate::retry::{Transient, retry};

// ---------------------------------------------------------------------------
// FetchError
// ---------------------------------------------------------------------------

/// What went wrong with a single GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The per-request deadline elapsed.
    Timeout,
    /// Connection could not be established.
    Connect,
    /// Response arrived with a non-2xx status.
    Status(u16),
    /// Reading the body failed midway.
    Body,
    /// The body did not decode as expected.
    Decode,
    Other,
}

/// Failure of one outbound request, tagged with the URL it targeted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("GET {url} failed: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn status(url: &Url, status: u16) -> Self {
        Self::new(FetchErrorKind::Status(status), url.as_str(), format!("HTTP {status}"))
    }

    fn from_reqwest(url: &Url, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if err.is_connect() {
            FetchErrorKind::Connect
        } else if err.is_decode() {
            FetchErrorKind::Decode
        } else if err.is_body() {
            FetchErrorKind::Body
        } else if let Some(status) = err.status() {
            FetchErrorKind::Status(status.as_u16())
        } else {
            FetchErrorKind::Other
        };
        Self::new(kind, url.as_str(), err.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FetchErrorKind::Timeout
    }
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self.kind {
            FetchErrorKind::Timeout | FetchErrorKind::Connect | FetchErrorKind::Body => true,
            FetchErrorKind::Status(status) => status == 429 || (500..600).contains(&status),
            FetchErrorKind::Decode | FetchErrorKind::Other => false,
        }
    }
}

impl From<FetchError> for KeywordScoutError {
    fn from(err: FetchError) -> Self {
        KeywordScoutError::Network(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Body read by [`HttpClient::get_until`].
#[derive(Debug, Clone)]
pub struct StreamedBody {
    pub text: String,
    /// True when the needle was found and the rest of the body was skipped.
    pub terminated_early: bool,
}

/// Shared outbound client. Cloning is cheap and keeps the same limiter.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    rotator: HeaderRotator,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(limiter: RateLimiter, retry: RetryPolicy) -> Result<Self> {
        retry.validate()?;
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| {
                KeywordScoutError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            rotator: HeaderRotator::new(),
            limiter,
            retry,
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Send one GET and reject non-2xx statuses.
    async fn send(
        &self,
        url: &Url,
        timeout: Duration,
        accept: Option<&'static str>,
    ) -> std::result::Result<Response, FetchError> {
        let mut headers = self.rotator.header_map();
        if let Some(accept) = accept {
            headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }

        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// GET a JSON document and deserialize it.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<T, FetchError> {
        retry(&self.retry, url.as_str(), move |_| {
            self.limiter.schedule(move || async move {
                let response = self.send(url, timeout, Some("application/json")).await?;
                response
                    .json::<T>()
                    .await
                    .map_err(|e| FetchError::from_reqwest(url, e))
            })
        })
        .await
    }

    /// GET a page and read the whole body as text.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_text(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<String, FetchError> {
        retry(&self.retry, url.as_str(), move |_| {
            self.limiter.schedule(move || async move {
                let response = self.send(url, timeout, None).await?;
                response
                    .text()
                    .await
                    .map_err(|e| FetchError::from_reqwest(url, e))
            })
        })
        .await
    }

    /// GET a page, reading chunks only until `needle` (ASCII case-insensitive)
    /// has been seen. The connection is dropped as soon as it matches.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_until(
        &self,
        url: &Url,
        timeout: Duration,
        needle: &str,
    ) -> std::result::Result<StreamedBody, FetchError> {
        retry(&self.retry, url.as_str(), move |_| {
            self.limiter.schedule(move || async move {
                let response = self.send(url, timeout, None).await?;
                read_until(url, response, needle.as_bytes()).await
            })
        })
        .await
    }
}

async fn read_until(
    url: &Url,
    response: Response,
    needle: &[u8],
) -> std::result::Result<StreamedBody, FetchError> {
    let mut stream = response.bytes_stream();
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
        // Re-scan the tail of the previous chunk so a split needle still matches.
        let from = body.len().saturating_sub(needle.len().saturating_sub(1));
        body.extend_from_slice(&chunk);

        if contains_ignore_ascii_case(&body[from..], needle) {
            debug!(bytes_read = body.len(), "needle found, closing stream early");
            return Ok(StreamedBody {
                text: String::from_utf8_lossy(&body).into_owned(),
                terminated_early: true,
            });
        }
    }

    Ok(StreamedBody {
        text: String::from_utf8_lossy(&body).into_owned(),
        terminated_early: false,
    })
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
