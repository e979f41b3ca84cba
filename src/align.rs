//! Needleman-Wunsch global alignment over arbitrary element sequences.
//!
//! Elements are only ever compared through a [`ScoringStrategy`]; the
//! engine never looks inside them. The DP matrix is stored flat for cache
//! efficiency and the whole (n+1)×(m+1) matrix is always evaluated.

use thiserror::Error;

use crate::models::AlignmentResult;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignError {
    #[error("{strategy}: no score defined for {left} vs {right}")]
    UnhandledPair {
        strategy: &'static str,
        left: String,
        right: String,
    },
}

/// Scores element pairs for [`align`].
///
/// `i` and `j` are the 0-based positions of `left` and `right` in their
/// sequences, which lets a strategy penalize pairs far off the diagonal.
pub trait ScoringStrategy<T> {
    fn score(&self, left: &T, right: &T, i: usize, j: usize) -> Result<f64, AlignError>;

    fn gap_penalty(&self) -> f64;

    /// Placeholder written on the side that has no element
    fn gap_marker(&self) -> T;
}

/// Strategy assembled from a closure, a gap penalty and a gap marker.
pub struct FnScoring<T, F> {
    score_fn: F,
    gap_penalty: f64,
    gap_marker: T,
}

impl<T, F> FnScoring<T, F>
where
    T: Clone,
    F: Fn(&T, &T, usize, usize) -> Result<f64, AlignError>,
{
    pub fn new(score_fn: F, gap_penalty: f64, gap_marker: T) -> Self {
        Self {
            score_fn,
            gap_penalty,
            gap_marker,
        }
    }
}

impl<T, F> ScoringStrategy<T> for FnScoring<T, F>
where
    T: Clone,
    F: Fn(&T, &T, usize, usize) -> Result<f64, AlignError>,
{
    fn score(&self, left: &T, right: &T, i: usize, j: usize) -> Result<f64, AlignError> {
        (self.score_fn)(left, right, i, j)
    }

    fn gap_penalty(&self) -> f64 {
        self.gap_penalty
    }

    fn gap_marker(&self) -> T {
        self.gap_marker.clone()
    }
}

/// Compute the maximal-score global alignment of `left` and `right`.
///
/// Traceback starts at the bottom-right cell and prefers a diagonal step,
/// then a step up (gap on the right), then a step left (gap on the left),
/// so equal-score ties always resolve the same way.
pub fn align<T, S>(left: &[T], right: &[T], strategy: &S) -> Result<AlignmentResult<T>, AlignError>
where
    T: Clone,
    S: ScoringStrategy<T> + ?Sized,
{
    let n = left.len();
    let m = right.len();
    let gap = strategy.gap_penalty();

    // H[i][j] = h[i * width + j]
    let width = m + 1;
    let mut h = vec![0f64; (n + 1) * width];

    for i in 1..=n {
        h[i * width] = gap * i as f64;
    }
    for j in 1..=m {
        h[j] = gap * j as f64;
    }

    for i in 1..=n {
        let row_offset = i * width;
        let prev_row_offset = (i - 1) * width;
        let elem_a = &left[i - 1];

        for j in 1..=m {
            let diagonal = h[prev_row_offset + (j - 1)] + strategy.score(elem_a, &right[j - 1], i - 1, j - 1)?;
            let up = h[prev_row_offset + j] + gap;
            let left_move = h[row_offset + (j - 1)] + gap;

            h[row_offset + j] = diagonal.max(up).max(left_move);
        }
    }

    let score = h[n * width + m];

    let mut aligned_left = Vec::with_capacity(n + m);
    let mut aligned_right = Vec::with_capacity(n + m);
    let mut i = n;
    let mut j = m;

    while i > 0 || j > 0 {
        let current = h[i * width + j];

        if i > 0 && j > 0 {
            let diagonal = h[(i - 1) * width + (j - 1)]
                + strategy.score(&left[i - 1], &right[j - 1], i - 1, j - 1)?;
            if current == diagonal {
                aligned_left.push(left[i - 1].clone());
                aligned_right.push(right[j - 1].clone());
                i -= 1;
                j -= 1;
                continue;
            }
        }

        if i > 0 && (j == 0 || current == h[(i - 1) * width + j] + gap) {
            // Gap on the right
            aligned_left.push(left[i - 1].clone());
            aligned_right.push(strategy.gap_marker());
            i -= 1;
        } else {
            // Gap on the left
            aligned_left.push(strategy.gap_marker());
            aligned_right.push(right[j - 1].clone());
            j -= 1;
        }
    }

    // Traceback runs backwards
    aligned_left.reverse();
    aligned_right.reverse();

    Ok(AlignmentResult {
        left: aligned_left,
        right: aligned_right,
        score,
    })
}
