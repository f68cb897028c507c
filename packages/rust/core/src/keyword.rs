//! Seed keyword sanitization and validation.

use std::sync::LazyLock;

use regex::Regex;

use keywordscout_shared::{KeywordScoutError, Result};

/// Shortest accepted keyword, in characters.
pub const MIN_KEYWORD_LEN: usize = 2;
/// Longest accepted keyword, in characters.
pub const MAX_KEYWORD_LEN: usize = 100;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").unwrap());

/// Strip HTML-like tags and surrounding whitespace.
pub fn sanitize_keyword(raw: &str) -> String {
    TAG.replace_all(raw, "").trim().to_string()
}

/// Sanitize `raw` and check its length. Returns the cleaned keyword.
pub fn validate_keyword(raw: &str) -> Result<String> {
    let keyword = sanitize_keyword(raw);
    let len = keyword.chars().count();
    if !(MIN_KEYWORD_LEN..=MAX_KEYWORD_LEN).contains(&len) {
        return Err(KeywordScoutError::validation(format!(
            "Invalid keyword: must be {MIN_KEYWORD_LEN}-{MAX_KEYWORD_LEN} characters after removing markup"
        )));
    }
    Ok(keyword)
}
