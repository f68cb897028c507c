//! Individual text-similarity metrics, each bounded to `[0, 1]`.
//!
//! All functions expect already-normalized input (see [`normalize`]).

use std::collections::HashSet;

/// `lowercase(trim(s))`.
pub fn normalize(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

/// Split a normalized phrase into whitespace-separated words.
pub fn tokenize(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// Dice coefficient over the two word *sets*.
pub fn word_overlap(a: &[&str], b: &[&str]) -> f64 {
    let set_a: HashSet<&str> = a.iter().copied().collect();
    let set_b: HashSet<&str> = b.iter().copied().collect();
    let total = set_a.len() + set_b.len();
    if total == 0 {
        return 1.0;
    }
    let shared = set_a.intersection(&set_b).count();
    (2 * shared) as f64 / total as f64
}

/// Longest common subsequence over word tokens, scaled as `2·LCS / (m + n)`.
pub fn sequence(a: &[&str], b: &[&str]) -> f64 {
    let (m, n) = (a.len(), b.len());
    if m + n == 0 {
        return 1.0;
    }

    // Rolling rows of the standard (m+1)×(n+1) table.
    let mut prev = vec![0usize; n + 1];
    let mut curr = vec![0usize; n + 1];
    for word_a in a {
        for (j, word_b) in b.iter().enumerate() {
            curr[j + 1] = if word_a == word_b {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[n];

    (2 * lcs) as f64 / (m + n) as f64
}

/// `1 − distance / max(len)` over full strings, in characters.
pub fn levenshtein(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Dice coefficient over the character-bigram multisets of both strings,
/// ignoring whitespace.
///
/// Strings too short to have a bigram compare by equality.
pub fn bigram_dice(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(a, b)
}
