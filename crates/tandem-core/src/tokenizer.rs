use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::constants::COMPLEXITY_SATURATION;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s']").unwrap());
static APOSTROPHE_TRIM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^'+|'+$").unwrap());

/// Tokenize text into lowercase words.
/// Preserves apostrophes within words (e.g., "don't").
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(text, " ");
    cleaned
        .to_lowercase()
        .split_whitespace()
        .map(|t| APOSTROPHE_TRIM.replace_all(t, "").to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Distinct lowercase tokens.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard similarity of the two token sets. Two empty texts are identical (1.0).
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa = token_set(a);
    let sb = token_set(b);
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    intersection as f64 / union as f64
}

/// Normalized lexical diversity in [0, 1].
///
/// Distinct tokens over total tokens, with the denominator floored at
/// COMPLEXITY_SATURATION so a three-word input is not rated maximally complex.
pub fn lexical_diversity(text: &str) -> f64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0.0;
    }
    let distinct = tokens.iter().collect::<HashSet<_>>().len();
    distinct as f64 / tokens.len().max(COMPLEXITY_SATURATION) as f64
}
