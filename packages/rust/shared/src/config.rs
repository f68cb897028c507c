//! Application configuration for KeywordScout.
//!
//! User config lives at `~/.keywordscout/keywordscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KeywordScoutError, Result};
use crate::types::Weights;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "keywordscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".keywordscout";

// ---------------------------------------------------------------------------
// Config structs (matching keywordscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream endpoints and per-request timeouts.
    #[serde(default)]
    pub http: HttpSection,

    /// Process-wide outbound request pacing.
    #[serde(default)]
    pub limiter: LimiterSection,

    /// Volume cache bounds.
    #[serde(default)]
    pub cache: CacheSection,

    /// Transient-failure retry policy.
    #[serde(default)]
    pub retry: RetrySection,

    /// Relevancy metric weights.
    #[serde(default)]
    pub scorer: Weights,

    /// Pipeline fan-out caps.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,
}

/// How volume pages are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    /// Download the whole body, then parse.
    Buffered,
    /// Read the body incrementally and stop once the volume phrase appears.
    #[default]
    Streaming,
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// Origin serving the annotation resource endpoint.
    #[serde(default = "default_annotation_base_url")]
    pub annotation_base_url: String,

    /// Origin serving the candidate search endpoint.
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    /// Origin that annotation paths are resolved against for volume pages.
    #[serde(default = "default_annotation_base_url")]
    pub volume_base_url: String,

    /// Hard timeout for one annotation scrape request.
    #[serde(default = "default_scrape_timeout_ms")]
    pub scrape_timeout_ms: u64,

    /// Volume page read strategy.
    #[serde(default)]
    pub volume_mode: VolumeMode,

    /// Timeout for a buffered volume fetch.
    #[serde(default = "default_buffered_timeout_ms")]
    pub buffered_timeout_ms: u64,

    /// Timeout for a streamed volume fetch.
    #[serde(default = "default_streaming_timeout_ms")]
    pub streaming_timeout_ms: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            annotation_base_url: default_annotation_base_url(),
            search_base_url: default_search_base_url(),
            volume_base_url: default_annotation_base_url(),
            scrape_timeout_ms: default_scrape_timeout_ms(),
            volume_mode: VolumeMode::default(),
            buffered_timeout_ms: default_buffered_timeout_ms(),
            streaming_timeout_ms: default_streaming_timeout_ms(),
        }
    }
}

fn default_annotation_base_url() -> String {
    "https://in.pinterest.com".into()
}
fn default_search_base_url() -> String {
    "https://www.pinterest.com".into()
}
fn default_scrape_timeout_ms() -> u64 {
    10_000
}
fn default_buffered_timeout_ms() -> u64 {
    5_000
}
fn default_streaming_timeout_ms() -> u64 {
    15_000
}

/// `[limiter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSection {
    /// Maximum outbound requests in flight across the process. Omit for
    /// unbounded concurrency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,

    /// Minimum ms between two request starts.
    #[serde(default = "default_min_time_ms")]
    pub min_time_ms: u64,
}

impl Default for LimiterSection {
    fn default() -> Self {
        Self {
            max_concurrent: Some(5),
            min_time_ms: default_min_time_ms(),
        }
    }
}

fn default_min_time_ms() -> u64 {
    200
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Upper bound on the summed serialized size of all values.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_bytes: default_max_bytes(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_entries() -> usize {
    50
}
fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_ttl_secs() -> u64 {
    60 * 60
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Relative jitter applied to each delay (0.15 = ±15%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            factor: default_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_factor() -> f64 {
    2.0
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_jitter() -> f64 {
    0.15
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// How many candidate ids to request from the search source.
    #[serde(default = "default_max_candidate_sources")]
    pub max_candidate_sources: usize,

    /// How many of those ids are actually scraped for annotations.
    #[serde(default = "default_max_scraped_ids")]
    pub max_scraped_ids: usize,

    /// Volume lookups polled concurrently within one run.
    #[serde(default = "default_volume_concurrency")]
    pub volume_concurrency: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_candidate_sources: default_max_candidate_sources(),
            max_scraped_ids: default_max_scraped_ids(),
            volume_concurrency: default_volume_concurrency(),
        }
    }
}

fn default_max_candidate_sources() -> usize {
    40
}
fn default_max_scraped_ids() -> usize {
    1
}
fn default_volume_concurrency() -> usize {
    16
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

impl AppConfig {
    /// Reject parameter combinations the limiter, cache, retry policy, or
    /// scorer cannot be constructed from.
    pub fn validate(&self) -> Result<()> {
        if self.limiter.max_concurrent == Some(0) {
            return Err(KeywordScoutError::config(
                "limiter.max_concurrent must be at least 1",
            ));
        }
        if self.cache.max_entries == 0 || self.cache.max_bytes == 0 {
            return Err(KeywordScoutError::config(
                "cache.max_entries and cache.max_bytes must be at least 1",
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(KeywordScoutError::config("cache.ttl_secs must be at least 1"));
        }
        RetryPolicy::from(self).validate()?;
        self.scorer.validate()?;
        if self.pipeline.max_candidate_sources == 0
            || self.pipeline.max_scraped_ids == 0
            || self.pipeline.volume_concurrency == 0
        {
            return Err(KeywordScoutError::config(
                "pipeline caps must all be at least 1",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from AppConfig, overridable in code)
// ---------------------------------------------------------------------------

/// Runtime rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// `None` leaves concurrency unbounded; only spacing applies.
    pub max_concurrent: Option<usize>,
    /// Minimum spacing between consecutive dispatches.
    pub min_time: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for LimiterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrent: config.limiter.max_concurrent.map(|limit| limit as usize),
            min_time: Duration::from_millis(config.limiter.min_time_ms),
        }
    }
}

/// Runtime cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CacheConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_entries: config.cache.max_entries,
            max_bytes: config.cache.max_bytes,
            ttl: Duration::from_secs(config.cache.ttl_secs),
        }
    }
}

/// Exponential backoff with jitter for transient failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Relative jitter in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry.max_attempts,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            factor: config.retry.factor,
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
            jitter: config.retry.jitter,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(KeywordScoutError::config("retry.max_attempts must be at least 1"));
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(KeywordScoutError::config("retry.factor must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(KeywordScoutError::config("retry.jitter must be within [0, 1]"));
        }
        Ok(())
    }

    /// Backoff before retry number `retry` (0-based), without jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = self.factor.powi(retry as i32);
        let millis = self.base_delay.as_millis() as f64 * exp;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Runtime HTTP endpoint configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub annotation_base_url: String,
    pub search_base_url: String,
    pub volume_base_url: String,
    pub scrape_timeout: Duration,
    pub volume_mode: VolumeMode,
    pub buffered_timeout: Duration,
    pub streaming_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            annotation_base_url: config.http.annotation_base_url.clone(),
            search_base_url: config.http.search_base_url.clone(),
            volume_base_url: config.http.volume_base_url.clone(),
            scrape_timeout: Duration::from_millis(config.http.scrape_timeout_ms),
            volume_mode: config.http.volume_mode,
            buffered_timeout: Duration::from_millis(config.http.buffered_timeout_ms),
            streaming_timeout: Duration::from_millis(config.http.streaming_timeout_ms),
        }
    }
}

impl HttpConfig {
    /// Timeout matching the configured volume read strategy.
    pub fn volume_timeout(&self) -> Duration {
        match self.volume_mode {
            VolumeMode::Buffered => self.buffered_timeout,
            VolumeMode::Streaming => self.streaming_timeout,
        }
    }
}

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_candidate_sources: usize,
    pub max_scraped_ids: usize,
    pub volume_concurrency: usize,
    pub volume_base_url: String,
    pub weights: Weights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_candidate_sources: config.pipeline.max_candidate_sources,
            max_scraped_ids: config.pipeline.max_scraped_ids,
            volume_concurrency: config.pipeline.volume_concurrency,
            volume_base_url: config.http.volume_base_url.clone(),
            weights: config.scorer,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.keywordscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| KeywordScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.keywordscout/keywordscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| KeywordScoutError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        KeywordScoutError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| KeywordScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| KeywordScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| KeywordScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("annotation_base_url"));
        assert!(toml_str.contains("max_entries"));
        assert!(toml_str.contains("volume_mode = \"streaming\""));
    }

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[limiter]
max_concurrent = 2

[scorer]
cosine = 1.0

[http]
volume_mode = "buffered"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.limiter.max_concurrent, Some(2));
        assert_eq!(config.limiter.min_time_ms, 200);
        assert_eq!(config.scorer, Weights::new(0.3, 0.3, 0.2, 1.0));
        assert_eq!(config.cache.max_entries, 50);

        let http = HttpConfig::from(&config);
        assert_eq!(http.volume_mode, VolumeMode::Buffered);
        assert_eq!(http.volume_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn omitted_max_concurrent_is_unbounded() {
        let config: AppConfig = toml::from_str("[limiter]\nmin_time_ms = 0\n").expect("parse");
        assert_eq!(config.limiter.max_concurrent, None);
        config.validate().expect("unbounded limiter is valid");

        let limiter = LimiterConfig::from(&config);
        assert_eq!(limiter.max_concurrent, None);
        assert_eq!(limiter.min_time, Duration::ZERO);

        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        assert!(!toml_str.contains("max_concurrent"));
    }

    #[test]
    fn default_config_writes_concurrency_limit() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(toml_str.contains("max_concurrent = 5"));
    }

    #[test]
    fn partial_scorer_section_keeps_default_weights() {
        let config: AppConfig = toml::from_str("[scorer]\ncosine = 1.0\n").expect("parse");
        assert_eq!(config.scorer, Weights::new(0.3, 0.3, 0.2, 1.0));
    }

    #[test]
    fn negative_limit_is_a_config_error() {
        let result: std::result::Result<AppConfig, _> =
            toml::from_str("[limiter]\nmax_concurrent = -1\n");
        assert!(result.is_err());
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = AppConfig::default();
        config.limiter.max_concurrent = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cache.max_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.jitter = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scorer = Weights::new(0.0, 0.0, 0.0, 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();
        let cache = CacheConfig::from(&app);
        assert_eq!(cache.max_entries, 50);
        assert_eq!(cache.max_bytes, 5 * 1024 * 1024);
        assert_eq!(cache.ttl, Duration::from_secs(3600));

        let limiter = LimiterConfig::from(&app);
        assert_eq!(limiter.max_concurrent, Some(5));
        assert_eq!(limiter.min_time, Duration::from_millis(200));

        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.max_scraped_ids, 1);
        assert_eq!(pipeline.weights, Weights::default());
    }

    #[test]
    fn retry_delays_grow_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
    }
}
