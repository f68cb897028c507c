//! Randomized browser-like request headers.
//!
//! Every outbound request gets a freshly generated `User-Agent` plus the
//! navigation headers a real browser would send, so consecutive requests do
//! not share one fingerprint.

use std::collections::BTreeMap;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const CHROME_VERSIONS: &[&str] = &["108.0.0.0", "107.0.0.0", "106.0.0.0"];
const FIREFOX_VERSIONS: &[&str] = &["107.0", "106.0", "105.0"];
const SAFARI_VERSIONS: &[&str] = &["16.0", "15.6", "15.5"];

const WINDOWS_VERSIONS: &[&str] = &["10.0", "11.0"];
const MACOS_VERSIONS: &[&str] = &["12_0", "11_6", "10_15"];
const LINUX_VERSIONS: &[&str] = &["x86_64", "i686"];

/// Browser families in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
}

impl Browser {
    pub const ALL: [Browser; 3] = [Browser::Chrome, Browser::Firefox, Browser::Safari];

    fn versions(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => CHROME_VERSIONS,
            Self::Firefox => FIREFOX_VERSIONS,
            Self::Safari => SAFARI_VERSIONS,
        }
    }

    /// Operating systems this browser plausibly runs on.
    pub fn compatible_os(self) -> &'static [Os] {
        match self {
            Self::Safari => &[Os::Windows, Os::MacOs],
            Self::Chrome | Self::Firefox => &[Os::Windows, Os::MacOs, Os::Linux],
        }
    }
}

/// Operating systems in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
}

impl Os {
    fn versions(self) -> &'static [&'static str] {
        match self {
            Self::Windows => WINDOWS_VERSIONS,
            Self::MacOs => MACOS_VERSIONS,
            Self::Linux => LINUX_VERSIONS,
        }
    }

    fn platform(self, version: &str) -> String {
        match self {
            Self::Windows => format!("Windows NT {version}"),
            Self::MacOs => format!("Macintosh; Intel Mac OS X {version}"),
            Self::Linux => format!("X11; Linux {version}"),
        }
    }
}

fn pick<'a, T, R: Rng>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.random_range(0..items.len())]
}

/// Generates plausible, varied browser request headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderRotator;

impl HeaderRotator {
    pub fn new() -> Self {
        Self
    }

    /// Build a User-Agent string. Unspecified browser/OS are chosen at random;
    /// an OS the browser does not run on is replaced by a compatible one.
    pub fn generate_with<R: Rng>(
        &self,
        rng: &mut R,
        browser: Option<Browser>,
        os: Option<Os>,
    ) -> String {
        let browser = browser.unwrap_or_else(|| *pick(rng, &Browser::ALL));
        let compatible = browser.compatible_os();
        let os = match os {
            Some(os) if compatible.contains(&os) => os,
            _ => *pick(rng, compatible),
        };

        let browser_version = *pick(rng, browser.versions());
        let os_version = *pick(rng, os.versions());

        match browser {
            Browser::Chrome => format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{browser_version} Safari/537.36",
                os.platform(os_version)
            ),
            Browser::Firefox => format!(
                "Mozilla/5.0 ({}; rv:{browser_version}) Gecko/20100101 Firefox/{browser_version}",
                os.platform(os_version)
            ),
            Browser::Safari => format!(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X {os_version}) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{browser_version} Safari/605.1.15"
            ),
        }
    }

    /// [`HeaderRotator::generate_with`] using the thread-local RNG.
    pub fn generate(&self, browser: Option<Browser>, os: Option<Os>) -> String {
        self.generate_with(&mut rand::rng(), browser, os)
    }

    /// Full navigation header set with a random User-Agent.
    pub fn headers_with<R: Rng>(&self, rng: &mut R) -> BTreeMap<String, String> {
        let user_agent = self.generate_with(rng, None, None);
        [
            ("User-Agent", user_agent.as_str()),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("DNT", "1"),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
            ("Cache-Control", "max-age=0"),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
    }

    pub fn headers(&self) -> BTreeMap<String, String> {
        self.headers_with(&mut rand::rng())
    }

    /// Random headers as a `reqwest` header map.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in self.headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                map.insert(name, value);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn headers_contain_navigation_set() {
        let headers = HeaderRotator::new().headers();
        for name in [
            "User-Agent",
            "Accept",
            "Accept-Language",
            "Accept-Encoding",
            "DNT",
            "Connection",
            "Sec-Fetch-Dest",
            "Sec-Fetch-Mode",
            "Sec-Fetch-Site",
            "Sec-Fetch-User",
            "Cache-Control",
        ] {
            assert!(headers.contains_key(name), "missing {name}");
        }
        assert!(headers["User-Agent"].starts_with("Mozilla/5.0 ("));
    }

    #[test]
    fn pinned_browser_and_os() {
        let rotator = HeaderRotator::new();
        let mut rng = StdRng::seed_from_u64(7);

        let ua = rotator.generate_with(&mut rng, Some(Browser::Firefox), Some(Os::Linux));
        assert!(ua.contains("X11; Linux "));
        assert!(ua.contains("Gecko/20100101 Firefox/"));

        let ua = rotator.generate_with(&mut rng, Some(Browser::Chrome), Some(Os::Windows));
        assert!(ua.contains("Windows NT "));
        assert!(ua.contains("Chrome/"));
    }

    #[test]
    fn safari_never_claims_linux() {
        let rotator = HeaderRotator::new();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let ua = rotator.generate_with(&mut rng, Some(Browser::Safari), Some(Os::Linux));
            assert!(!ua.contains("Linux"));
            assert!(ua.contains("Version/"));
        }
    }

    #[test]
    fn user_agents_vary() {
        let rotator = HeaderRotator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let distinct: std::collections::HashSet<String> = (0..50)
            .map(|_| rotator.generate_with(&mut rng, None, None))
            .collect();
        assert!(distinct.len() > 5);
    }

    #[test]
    fn header_map_is_complete() {
        let map = HeaderRotator::new().header_map();
        assert_eq!(map.len(), 12);
        assert!(map.contains_key(reqwest::header::USER_AGENT));
    }
}
