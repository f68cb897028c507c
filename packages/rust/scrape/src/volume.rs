//! Search volume resolution from "N people searched this" pages.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use keywordscout_shared::{HttpConfig, VolumeMode};

use crate::cache::VolumeCache;
use crate::http::HttpClient;

/// Phrase that marks the volume figure on a page.
pub const PHRASE: &str = "people searched this";

static VOLUME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)([km])?\s*people searched this").unwrap()
});

static ANY_ELEMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());

/// Parse the first `<number>[k|M] people searched this` figure in `text`.
pub fn parse_volume(text: &str) -> Option<u64> {
    let caps = VOLUME.captures(text)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" => 1_000.0,
        Some(suffix) if suffix == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as u64)
}

/// Find the first element, in document order, whose combined text mentions
/// the phrase, and parse the volume from that text.
pub fn extract_volume(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    document
        .select(&ANY_ELEMENT)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.to_lowercase().contains(PHRASE))
        .and_then(|text| parse_volume(&text))
}

// ---------------------------------------------------------------------------
// VolumeResolver
// ---------------------------------------------------------------------------

/// Cache-first volume lookup. Every failure is soft and yields `None`.
#[derive(Debug, Clone)]
pub struct VolumeResolver {
    http: HttpClient,
    cache: Arc<VolumeCache>,
    mode: VolumeMode,
    timeout: Duration,
}

impl VolumeResolver {
    pub fn new(http: HttpClient, cache: Arc<VolumeCache>, config: &HttpConfig) -> Self {
        Self {
            http,
            cache,
            mode: config.volume_mode,
            timeout: config.volume_timeout(),
        }
    }

    pub fn mode(&self) -> VolumeMode {
        self.mode
    }

    /// Resolve the search volume shown at `url`.
    #[instrument(skip_all, fields(url = %url, mode = ?self.mode))]
    pub async fn resolve(&self, url: &str) -> Option<u64> {
        if let Some(volume) = self.cache.get(url) {
            debug!(volume, "volume cache hit");
            return Some(volume);
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => {
                debug!("malformed volume url, skipping");
                return None;
            }
        };

        let html = match self.mode {
            VolumeMode::Buffered => self.http.get_text(&parsed, self.timeout).await,
            VolumeMode::Streaming => self
                .http
                .get_until(&parsed, self.timeout, PHRASE)
                .await
                .map(|body| body.text),
        };

        let html = match html {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind, "volume fetch failed");
                return None;
            }
        };

        match extract_volume(&html) {
            Some(volume) => {
                self.cache.set(url, volume);
                debug!(volume, "resolved search volume");
                Some(volume)
            }
            None => {
                debug!("search volume not found on page");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimiter;
    use keywordscout_shared::{CacheConfig, RetryPolicy};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(mode: VolumeMode) -> (VolumeResolver, Arc<VolumeCache>) {
        let http = HttpClient::new(RateLimiter::unlimited(), RetryPolicy::none()).unwrap();
        let cache = Arc::new(VolumeCache::new(CacheConfig::default()).unwrap());
        let config = HttpConfig {
            volume_mode: mode,
            ..HttpConfig::default()
        };
        (VolumeResolver::new(http, cache.clone(), &config), cache)
    }

    const PAGE: &str = r#"<html><body>
        <div class="header"><h1>Vegan dinner recipes</h1></div>
        <div class="stats"><span>1.2k</span> people searched this</div>
    </body></html>"#;

    #[test]
    fn parses_suffixes() {
        assert_eq!(parse_volume("1.2k people searched this"), Some(1200));
        assert_eq!(parse_volume("3M people searched this"), Some(3_000_000));
        assert_eq!(parse_volume("850 People Searched This"), Some(850));
        assert_eq!(parse_volume("2.5K   people searched this"), Some(2500));
        assert_eq!(parse_volume("nobody searched this"), None);
    }

    #[test]
    fn extracts_from_nested_markup() {
        assert_eq!(extract_volume(PAGE), Some(1200));
        assert_eq!(extract_volume("<html><body><p>nothing</p></body></html>"), None);
    }

    #[test]
    fn first_mention_in_document_order_wins() {
        let html = "<div><p>40 people searched this</p><p>7k people searched this</p></div>";
        assert_eq!(extract_volume(html), Some(40));
    }

    #[test]
    fn resolver_debug_shows_cache_state() {
        let (resolver, cache) = resolver(VolumeMode::Buffered);
        cache.set("https://example.com/a", 12);
        let rendered = format!("{resolver:?}");
        assert!(rendered.contains("BoundedCache"));
        assert!(rendered.contains("len: 1"));
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/pins/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let (resolver, cache) = resolver(VolumeMode::Buffered);
        let url = format!("{}/search/pins/?q=vegan", server.uri());

        assert_eq!(resolver.resolve(&url).await, Some(1200));
        assert_eq!(resolver.resolve(&url).await, Some(1200));
        assert_eq!(cache.get(&url), Some(1200));
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>no figure</p>"))
            .expect(2)
            .mount(&server)
            .await;

        let (resolver, cache) = resolver(VolumeMode::Buffered);
        let url = format!("{}/empty", server.uri());

        assert_eq!(resolver.resolve(&url).await, None);
        assert_eq!(resolver.resolve(&url).await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn malformed_url_is_soft_failure() {
        let (resolver, _) = resolver(VolumeMode::Buffered);
        assert_eq!(resolver.resolve("not a url").await, None);
        assert_eq!(resolver.resolve("/relative/path").await, None);
        assert_eq!(resolver.resolve("ftp://example.com/x").await, None);
    }

    #[tokio::test]
    async fn upstream_error_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (resolver, _) = resolver(VolumeMode::Streaming);
        assert_eq!(resolver.resolve(&format!("{}/boom", server.uri())).await, None);
    }

    #[tokio::test]
    async fn streaming_mode_resolves() {
        let server = MockServer::start().await;
        let mut body = String::from("<html><body><div>3M people searched this</div>");
        body.push_str(&"<p>filler</p>".repeat(2000));
        body.push_str("</body></html>");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let (resolver, _) = resolver(VolumeMode::Streaming);
        assert_eq!(resolver.mode(), VolumeMode::Streaming);
        assert_eq!(
            resolver.resolve(&format!("{}/big", server.uri())).await,
            Some(3_000_000)
        );
    }
}
