//! Core domain types for the keyword ranking pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KeywordScoutError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// A candidate keyword phrase harvested from a content record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    /// Relative path of the annotation's own page (used to look up volume).
    pub url: String,
    /// Human-readable keyword phrase.
    pub name: String,
}

impl Annotation {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }

    /// Both fields are non-empty after trimming.
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty() && !self.name.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Scoring input / output
// ---------------------------------------------------------------------------

/// One scorer input row: a candidate phrase with its resolved volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankCandidate {
    pub annotation: String,
    /// Search volume; `0` when it could not be resolved.
    pub volume: u64,
}

impl RankCandidate {
    pub fn new(annotation: impl Into<String>, volume: u64) -> Self {
        Self {
            annotation: annotation.into(),
            volume,
        }
    }
}

/// A candidate annotation with its composite relevancy to the seed keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAnnotation {
    /// The candidate phrase as harvested.
    pub annotation: String,
    /// Search volume; `0` when it could not be resolved.
    pub volume: u64,
    /// Weighted composite similarity in `[0, 1]`.
    pub relevancy_score: f64,
    /// `lowercase(trim(annotation))`.
    pub normalized_annotation: String,
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Per-metric weights for the composite relevancy score.
///
/// Weights need not sum to 1; the scorer divides by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub word_overlap: f64,
    pub sequence: f64,
    pub levenshtein: f64,
    pub cosine: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            word_overlap: 0.3,
            sequence: 0.3,
            levenshtein: 0.2,
            cosine: 0.2,
        }
    }
}

impl Weights {
    pub fn new(word_overlap: f64, sequence: f64, levenshtein: f64, cosine: f64) -> Self {
        Self {
            word_overlap,
            sequence,
            levenshtein,
            cosine,
        }
    }

    /// Sum of all four weights.
    pub fn sum(&self) -> f64 {
        self.word_overlap + self.sequence + self.levenshtein + self.cosine
    }

    /// Reject negative or non-finite weights, a sum that overflows, and an
    /// all-zero configuration.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("word_overlap", self.word_overlap),
            ("sequence", self.sequence),
            ("levenshtein", self.levenshtein),
            ("cosine", self.cosine),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(KeywordScoutError::config(format!(
                    "weight {name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        let sum = self.sum();
        if !sum.is_finite() {
            return Err(KeywordScoutError::config("weights overflow when summed"));
        }
        if sum <= 0.0 {
            return Err(KeywordScoutError::config("weights must not all be zero"));
        }
        Ok(())
    }
}
