//! Shared types, error model, and configuration for KeywordScout.
//!
//! This crate is the foundation depended on by all other KeywordScout crates.
//! It provides:
//! - [`KeywordScoutError`]: the unified request-level error type
//! - Domain types ([`Annotation`], [`ScoredAnnotation`], [`Weights`], [`RunId`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CacheSection, HttpConfig, HttpSection, LimiterConfig, LimiterSection,
    PipelineConfig, PipelineSection, RetryPolicy, RetrySection, ServerSection, VolumeMode,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{KeywordScoutError, Result};
pub use types::{Annotation, RankCandidate, RunId, ScoredAnnotation, Weights};
