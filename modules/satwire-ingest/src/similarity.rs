//! Title similarity scoring for near-duplicate grouping.
//!
//! Two-tier check: cheap Jaccard token overlap first, a normalized
//! Levenshtein fallback (`strsim`) only in the near-band where
//! token-set overlap is fooled by reordering and punctuation.
//! `match_score` returns `None` for "no match" — distinct from a zero
//! score.
//!
//! The thresholds are empirically chosen constants. Downstream tests
//! encode numeric examples against these exact values, so they are kept
//! as configuration rather than re-derived.

use std::collections::HashSet;

/// Jaccard similarity at or above this accepts outright.
pub const JACCARD_THRESHOLD: f64 = 0.85;
/// Lower edge of the near-band where the edit-distance fallback runs.
pub const JACCARD_NEAR_MIN: f64 = 0.80;
/// The normalized Levenshtein similarity a near-band pair must clear.
pub const LEVENSHTEIN_THRESHOLD: f64 = 0.85;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "to", "for", "of", "in", "on", "at", "with", "by", "from",
    "as", "is", "are", "be", "this", "that", "will",
];

/// Matching score for two titles, or `None` when they do not match.
pub fn match_score(title_a: &str, title_b: &str) -> Option<f64> {
    let tokens_a = normalize_title(title_a);
    let tokens_b = normalize_title(title_b);
    let jaccard = jaccard_similarity(&tokens_a, &tokens_b);

    if jaccard >= JACCARD_THRESHOLD {
        return Some(jaccard);
    }

    if (JACCARD_NEAR_MIN..JACCARD_THRESHOLD).contains(&jaccard) {
        let ratio =
            strsim::normalized_levenshtein(&title_a.to_lowercase(), &title_b.to_lowercase());
        if ratio >= LEVENSHTEIN_THRESHOLD {
            return Some(ratio);
        }
    }

    None
}

/// Lowercase, split on non-alphanumeric runs, drop stop-words and
/// tokens shorter than two characters.
pub fn normalize_title(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two token lists treated as sets.
pub fn jaccard_similarity(tokens_a: &[String], tokens_b: &[String]) -> f64 {
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<&str> = tokens_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = tokens_b.iter().map(String::as_str).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
