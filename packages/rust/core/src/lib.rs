//! Core pipeline orchestration for KeywordScout.
//!
//! This crate ties together candidate discovery, annotation scraping, volume
//! resolution, and relevancy scoring into the end-to-end `rank` workflow.

pub mod keyword;
pub mod pipeline;

pub use keyword::{MAX_KEYWORD_LEN, MIN_KEYWORD_LEN, sanitize_keyword, validate_keyword};
pub use pipeline::{Pipeline, ProgressReporter, RankResult, SilentProgress};
