//! Error types for KeywordScout.
//!
//! Library crates use [`KeywordScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//! Per-item failures (one candidate id, one volume URL) have their own error
//! types in `keywordscout-scrape` and never surface here.

use std::path::PathBuf;

/// Top-level error type for request-level KeywordScout operations.
#[derive(Debug, thiserror::Error)]
pub enum KeywordScoutError {
    /// Invalid configuration (limiter, cache, retry, or scorer parameters).
    #[error("config error: {message}")]
    Config { message: String },

    /// Bad caller input (seed keyword, id, URL). Never retried.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A structurally required upstream step failed (e.g. candidate search).
    #[error("network error: {0}")]
    Network(String),

    /// Upstream response did not have the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KeywordScoutError>;

impl KeywordScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
