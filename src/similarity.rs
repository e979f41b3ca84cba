//! Token-set Jaccard similarity with a confidence score.
//!
//! Short fragments share tokens by accident, so every similarity is paired
//! with a confidence that grows with the size of the smaller token set.

use std::collections::HashSet;

use crate::models::{Similarity, TextAlignment};

/// Token count at which confidence saturates
pub const CONFIDENCE_SATURATION: f64 = 10.0;

/// Compute the Jaccard similarity of two strings' whitespace token sets.
///
/// When `truncate_to_shortest` is set, both strings are clipped to the
/// shorter string's character length, keeping the prefix (`Left`) or the
/// suffix (`Right`) of each.
pub fn compute_similarity(
    a: &str,
    b: &str,
    truncate_to_shortest: bool,
    alignment: TextAlignment,
) -> Similarity {
    let (a, b) = if truncate_to_shortest {
        truncate_pair(a, b, alignment)
    } else {
        (a, b)
    };

    if !a.is_empty() && a == b {
        return Similarity::IDENTICAL;
    }

    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.len() + tokens_b.len() - intersection;
    // Disjoint sets carry no evidence either way
    if union == 0 || intersection == 0 {
        return Similarity::NONE;
    }

    Similarity {
        similarity: jaccard(intersection, union),
        confidence: confidence(tokens_a.len().min(tokens_b.len())),
    }
}

/// Confidence for a comparison whose smaller token set has `min_tokens` entries.
#[inline]
pub fn confidence(min_tokens: usize) -> f64 {
    (min_tokens as f64 / CONFIDENCE_SATURATION).min(1.0)
}

#[inline]
fn jaccard(intersection: usize, union: usize) -> f64 {
    intersection as f64 / union as f64
}

/// Unique whitespace-separated tokens
pub fn tokenize(s: &str) -> HashSet<&str> {
    s.split_whitespace().collect()
}

fn truncate_pair<'a>(a: &'a str, b: &'a str, alignment: TextAlignment) -> (&'a str, &'a str) {
    let len = a.chars().count().min(b.chars().count());
    (
        clip_chars(a, len, alignment),
        clip_chars(b, len, alignment),
    )
}

/// Keep `len` characters from the start (`Left`) or end (`Right`) of `s`.
fn clip_chars(s: &str, len: usize, alignment: TextAlignment) -> &str {
    let total = s.chars().count();
    if len >= total {
        return s;
    }
    match alignment {
        TextAlignment::Left => {
            let end = s.char_indices().nth(len).map(|(i, _)| i).unwrap_or(s.len());
            &s[..end]
        }
        TextAlignment::Right => {
            let start = s
                .char_indices()
                .nth(total - len)
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            &s[start..]
        }
    }
}
