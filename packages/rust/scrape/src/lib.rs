//! Outbound scraping for KeywordScout.
//!
//! Everything that touches the scraped site lives here: header rotation,
//! the shared rate limiter, retrying HTTP, the volume cache, the annotation
//! scraper, and the volume resolver.

pub mod annotations;
pub mod cache;
pub mod headers;
pub mod http;
pub mod limiter;
pub mod retry;
pub mod volume;

pub use annotations::{AnnotationScraper, ScrapeError, extract_annotations};
pub use cache::{BoundedCache, VolumeCache};
pub use headers::{Browser, HeaderRotator, Os};
pub use http::{FetchError, FetchErrorKind, HttpClient, StreamedBody};
pub use limiter::RateLimiter;
pub use retry::{Transient, retry};
pub use volume::{PHRASE, VolumeResolver, extract_volume, parse_volume};
