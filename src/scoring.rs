//! Scoring strategies plugged into [`crate::align::align`].

use crate::align::{AlignError, ScoringStrategy};
use crate::models::{Fragment, NodeKind, ScoringParams, StructuralNode, TextAlignment};
use crate::similarity::compute_similarity;

pub const DEFAULT_GAP_PENALTY: f64 = -10.0;

/// Score for an exact content match
const MAX_CONTENT_SCORE: f64 = 100.0;

/// Identity-by-id scoring with diagonal-band pruning.
///
/// Elements are `Option<String>` ids; `None` is the gap marker. Pairs whose
/// positions differ by more than `band` score `2 * gap_penalty` without
/// being compared, so the traceback never picks them.
#[derive(Debug, Clone, PartialEq)]
pub struct IdScoring {
    pub band: usize,
    pub gap_penalty: f64,
    pub match_score: f64,
    pub mismatch_score: f64,
}

impl IdScoring {
    /// Equal ids score 10, unequal ids 0.
    pub fn identity(band: usize) -> Self {
        Self {
            band,
            gap_penalty: DEFAULT_GAP_PENALTY,
            match_score: 10.0,
            mismatch_score: 0.0,
        }
    }

    /// Subtitle id scoring: unequal ids score `gap_penalty * 1.1`, which
    /// still beats a deletion plus an insertion.
    pub fn subtitle_stid(band: usize) -> Self {
        Self::from_params(&ScoringParams {
            band,
            ..ScoringParams::default()
        })
    }

    /// Subtitle id scoring with the given band, gap penalty and match score.
    pub fn from_params(params: &ScoringParams) -> Self {
        Self {
            band: params.band,
            gap_penalty: params.gap_penalty,
            match_score: params.match_score,
            mismatch_score: params.gap_penalty * 1.1,
        }
    }

    #[inline]
    fn off_band(&self, i: usize, j: usize) -> bool {
        i.abs_diff(j) > self.band
    }
}

impl ScoringStrategy<Option<String>> for IdScoring {
    fn score(
        &self,
        left: &Option<String>,
        right: &Option<String>,
        i: usize,
        j: usize,
    ) -> Result<f64, AlignError> {
        if self.off_band(i, j) {
            return Ok(self.gap_penalty * 2.0);
        }
        match (left, right) {
            (Some(a), Some(b)) if a == b => Ok(self.match_score),
            (Some(_), Some(_)) => Ok(self.mismatch_score),
            _ => Err(AlignError::UnhandledPair {
                strategy: "IdScoring",
                left: format!("{:?}", left),
                right: format!("{:?}", right),
            }),
        }
    }

    fn gap_penalty(&self) -> f64 {
        self.gap_penalty
    }

    fn gap_marker(&self) -> Option<String> {
        None
    }
}

/// Content-similarity scoring of text fragments.
///
/// Score is `100 * similarity * confidence`, the better of the untruncated
/// comparison and the left-aligned comparison truncated to the shorter text.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentScoring {
    pub gap_penalty: f64,
}

impl Default for ContentScoring {
    fn default() -> Self {
        Self {
            gap_penalty: DEFAULT_GAP_PENALTY,
        }
    }
}

impl ContentScoring {
    pub fn score_texts(&self, a: &str, b: &str) -> f64 {
        let absolute = MAX_CONTENT_SCORE * compute_similarity(a, b, false, TextAlignment::Left).weighted();
        if absolute >= MAX_CONTENT_SCORE {
            return absolute;
        }
        let left_aligned = MAX_CONTENT_SCORE * compute_similarity(a, b, true, TextAlignment::Left).weighted();
        absolute.max(left_aligned)
    }
}

impl ScoringStrategy<Fragment> for ContentScoring {
    fn score(&self, left: &Fragment, right: &Fragment, _i: usize, _j: usize) -> Result<f64, AlignError> {
        match (left, right) {
            (Fragment::Text(a), Fragment::Text(b)) => Ok(self.score_texts(a, b)),
            _ => Err(AlignError::UnhandledPair {
                strategy: "ContentScoring",
                left: format!("{:?}", left),
                right: format!("{:?}", right),
            }),
        }
    }

    fn gap_penalty(&self) -> f64 {
        self.gap_penalty
    }

    fn gap_marker(&self) -> Fragment {
        Fragment::Gap
    }
}

/// Structural scoring of headers, paragraphs and blocks by type and key.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralScoring {
    pub gap_penalty: f64,
    pub header_match_bonus: f64,
    pub match_bonus: f64,
    pub type_mismatch_penalty: f64,
    pub key_mismatch_penalty: f64,
}

impl Default for StructuralScoring {
    fn default() -> Self {
        Self {
            gap_penalty: DEFAULT_GAP_PENALTY,
            header_match_bonus: 20.0,
            match_bonus: 10.0,
            type_mismatch_penalty: -50.0,
            key_mismatch_penalty: -25.0,
        }
    }
}

impl StructuralScoring {
    fn must_align(kind: NodeKind) -> bool {
        matches!(kind, NodeKind::Header | NodeKind::Paragraph)
    }
}

impl ScoringStrategy<StructuralNode> for StructuralScoring {
    fn score(
        &self,
        left: &StructuralNode,
        right: &StructuralNode,
        _i: usize,
        _j: usize,
    ) -> Result<f64, AlignError> {
        if !left.is_gap() && left.kind == right.kind && left.key == right.key {
            return Ok(match left.kind {
                NodeKind::Header => self.header_match_bonus,
                _ => self.match_bonus,
            });
        }
        if Self::must_align(left.kind) && Self::must_align(right.kind) {
            return Ok(if left.kind != right.kind {
                self.type_mismatch_penalty
            } else {
                self.key_mismatch_penalty
            });
        }
        Err(AlignError::UnhandledPair {
            strategy: "StructuralScoring",
            left: format!("{:?}({})", left.kind, left.key),
            right: format!("{:?}({})", right.kind, right.key),
        })
    }

    fn gap_penalty(&self) -> f64 {
        self.gap_penalty
    }

    fn gap_marker(&self) -> StructuralNode {
        StructuralNode::gap()
    }
}

/// Exact line matching for line-level diffs.
///
/// Unequal lines score below two gaps, so a changed line always comes out
/// as a deletion plus an addition rather than a substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct LineScoring {
    pub gap_penalty: f64,
}

impl Default for LineScoring {
    fn default() -> Self {
        Self {
            gap_penalty: DEFAULT_GAP_PENALTY,
        }
    }
}

impl ScoringStrategy<Option<String>> for LineScoring {
    fn score(
        &self,
        left: &Option<String>,
        right: &Option<String>,
        _i: usize,
        _j: usize,
    ) -> Result<f64, AlignError> {
        match (left, right) {
            (Some(a), Some(b)) if a == b => Ok(-self.gap_penalty),
            (Some(_), Some(_)) => Ok(self.gap_penalty * 2.0 - 1.0),
            _ => Err(AlignError::UnhandledPair {
                strategy: "LineScoring",
                left: format!("{:?}", left),
                right: format!("{:?}", right),
            }),
        }
    }

    fn gap_penalty(&self) -> f64 {
        self.gap_penalty
    }

    fn gap_marker(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;

    fn ids(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_stid_scores() {
        let scoring = IdScoring::subtitle_stid(100);
        let a = Some("abcd".to_string());
        let b = Some("efgh".to_string());

        assert_eq!(scoring.score(&a, &a, 0, 0).unwrap(), 10.0);
        assert!((scoring.score(&a, &b, 0, 0).unwrap() - (-11.0)).abs() < 1e-9);
    }

    #[test]
    fn test_identity_scores() {
        let scoring = IdScoring::identity(5);
        let a = Some("1".to_string());
        let b = Some("2".to_string());

        assert_eq!(scoring.score(&a, &a, 3, 3).unwrap(), 10.0);
        assert_eq!(scoring.score(&a, &b, 3, 3).unwrap(), 0.0);
        // Off band: never compared
        assert_eq!(scoring.score(&a, &a, 0, 6).unwrap(), -20.0);
        assert_eq!(scoring.score(&a, &a, 0, 5).unwrap(), 10.0);
    }

    #[test]
    fn test_identity_gap_element_is_error() {
        let scoring = IdScoring::identity(5);
        assert!(scoring.score(&None, &Some("1".to_string()), 0, 0).is_err());
    }

    #[test]
    fn test_identical_id_sequences_align_without_gaps() {
        let seq = ids(&["1", "2", "3", "4", "5"]);
        let result = align(&seq, &seq, &IdScoring::identity(100)).unwrap();

        assert_eq!(result.left, seq);
        assert_eq!(result.right, seq);
        assert!(result.left.iter().all(|e| e.is_some()));
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn test_id_alignment_with_insertion() {
        let a = ids(&["1", "2", "3", "4"]);
        let b = ids(&["1", "2", "x", "3", "4"]);
        let result = align(&a, &b, &IdScoring::subtitle_stid(100)).unwrap();

        assert_eq!(result.len(), 5);
        assert_eq!(result.left[2], None);
        assert_eq!(result.right[2], Some("x".to_string()));
    }

    #[test]
    fn test_band_keeps_alignment_near_diagonal() {
        // "1" at the far end would match, but it is outside the band
        let a = ids(&["1", "2", "3", "4", "5", "6"]);
        let b = ids(&["2", "3", "4", "5", "6", "1"]);

        let wide = align(&a, &b, &IdScoring::identity(100)).unwrap();
        let narrow = align(&a, &b, &IdScoring::identity(0)).unwrap();

        let matches = |r: &crate::models::AlignmentResult<Option<String>>| {
            r.pairs().filter(|(l, r)| l.is_some() && l == r).count()
        };
        assert_eq!(matches(&wide), 5);
        assert_eq!(matches(&narrow), 0);
    }

    #[test]
    fn test_content_scoring_exact() {
        let scoring = ContentScoring::default();
        let text = "the quick brown fox jumps over the lazy dog again and again";
        assert_eq!(scoring.score_texts(text, text), 100.0);
    }

    #[test]
    fn test_content_scoring_prefers_left_truncation() {
        let scoring = ContentScoring::default();
        let long = "a b c d e f g h i j k l m n o p q r s t";
        let short = "a b c d e f g h i j";
        let absolute = 100.0 * compute_similarity(long, short, false, TextAlignment::Left).weighted();
        let score = scoring.score_texts(long, short);

        assert!((absolute - 50.0).abs() < 1e-9);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_content_alignment_with_gap() {
        let scoring = ContentScoring::default();
        let a = vec![
            Fragment::text("one two three four five six seven eight nine ten"),
            Fragment::text("alpha beta gamma delta epsilon zeta eta theta iota kappa"),
        ];
        let b = vec![Fragment::text("alpha beta gamma delta epsilon zeta eta theta iota kappa")];
        let result = align(&a, &b, &scoring).unwrap();

        assert_eq!(result.right[0], Fragment::Gap);
        assert_eq!(result.left[1], result.right[1]);
    }

    #[test]
    fn test_content_gap_is_error() {
        let scoring = ContentScoring::default();
        assert!(scoring.score(&Fragment::Gap, &Fragment::text("x"), 0, 0).is_err());
    }

    #[test]
    fn test_structural_scores() {
        let scoring = StructuralScoring::default();
        let h1 = StructuralNode::new(NodeKind::Header, "intro");
        let h2 = StructuralNode::new(NodeKind::Header, "outro");
        let p1 = StructuralNode::new(NodeKind::Paragraph, "p1");
        let p2 = StructuralNode::new(NodeKind::Paragraph, "p2");
        let b1 = StructuralNode::new(NodeKind::Block, "img");
        let b2 = StructuralNode::new(NodeKind::Block, "tbl");

        assert_eq!(scoring.score(&h1, &h1, 0, 0).unwrap(), 20.0);
        assert_eq!(scoring.score(&p1, &p1, 0, 0).unwrap(), 10.0);
        assert_eq!(scoring.score(&b1, &b1, 0, 0).unwrap(), 10.0);
        assert_eq!(scoring.score(&p1, &p2, 0, 0).unwrap(), -25.0);
        assert_eq!(scoring.score(&h1, &h2, 0, 0).unwrap(), -25.0);
        assert_eq!(scoring.score(&h1, &p1, 0, 0).unwrap(), -50.0);

        assert!(scoring.score(&b1, &b2, 0, 0).is_err());
        assert!(scoring.score(&b1, &p1, 0, 0).is_err());
        assert!(scoring.score(&StructuralNode::gap(), &StructuralNode::gap(), 0, 0).is_err());
    }

    #[test]
    fn test_structural_alignment() {
        let scoring = StructuralScoring::default();
        let a = vec![
            StructuralNode::new(NodeKind::Header, "h"),
            StructuralNode::new(NodeKind::Paragraph, "p1"),
            StructuralNode::new(NodeKind::Paragraph, "p2"),
        ];
        let b = vec![
            StructuralNode::new(NodeKind::Header, "h"),
            StructuralNode::new(NodeKind::Paragraph, "p2"),
        ];
        let result = align(&a, &b, &scoring).unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.right[1].is_gap());
        assert_eq!(result.right[2].key, "p2");
    }

    #[test]
    fn test_line_scoring_never_substitutes() {
        let a = ids(&["x", "old", "y"]);
        let b = ids(&["x", "new", "y"]);
        let result = align(&a, &b, &LineScoring::default()).unwrap();

        // Up is tried before left during traceback, which runs backwards,
        // so the addition lands ahead of the deletion.
        assert_eq!(result.len(), 4);
        assert_eq!(result.left[1], None);
        assert_eq!(result.right[1], Some("new".to_string()));
        assert_eq!(result.left[2], Some("old".to_string()));
        assert_eq!(result.right[2], None);
    }
}
