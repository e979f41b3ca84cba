//! Data structures for the subtitle revision pipeline.

use serde::{Deserialize, Serialize};

/// A uniquely identified boundary marker attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subtitle {
    pub persistent_id: String,
    pub record_id: Option<String>,
}

impl Subtitle {
    pub fn new(persistent_id: impl Into<String>) -> Self {
        Self {
            persistent_id: persistent_id.into(),
            record_id: None,
        }
    }

    pub fn with_record_id(persistent_id: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            persistent_id: persistent_id.into(),
            record_id: Some(record_id.into()),
        }
    }
}

/// Snapshot of one subtitle's adjacent text on either side of an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedElement {
    pub stid: String,
    pub record_id: Option<String>,
    pub before: String,
    pub after: String,
}

impl AffectedElement {
    pub fn new(stid: impl Into<String>, before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            stid: stid.into(),
            record_id: None,
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Kind of subtitle edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Insert,
    Delete,
    Merge,
    Split,
    MoveLeft,
    MoveRight,
    ContentChange,
    RecordIdChange,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "insert",
            OperationType::Delete => "delete",
            OperationType::Merge => "merge",
            OperationType::Split => "split",
            OperationType::MoveLeft => "move_left",
            OperationType::MoveRight => "move_right",
            OperationType::ContentChange => "content_change",
            OperationType::RecordIdChange => "record_id_change",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed, invertible subtitle edit.
///
/// For `merge` and `split` the first affected element is the subtitle that
/// survives (merge) or is split (split); the remaining ones disappear or are
/// newly created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: String,
    pub operation_type: OperationType,
    pub after_stid: Option<String>,
    pub affected_stids: Vec<AffectedElement>,
}

/// Operations between two revisions of one document, as persisted/exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    pub file_path: String,
    pub from_revision: String,
    pub to_revision: String,
    pub product_identity_id: Option<String>,
    pub language: Option<String>,
    pub operations: Vec<Operation>,
}

/// Origin of one line in a line-level diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    Context,
    Deletion,
    Addition,
}

/// One line of a full-context diff between two annotated texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_origin: LineOrigin,
    pub content: String,
    pub old_line_number: Option<usize>,
}

impl DiffLine {
    pub fn context(content: impl Into<String>, old_line_number: usize) -> Self {
        Self {
            line_origin: LineOrigin::Context,
            content: content.into(),
            old_line_number: Some(old_line_number),
        }
    }

    pub fn deletion(content: impl Into<String>, old_line_number: usize) -> Self {
        Self {
            line_origin: LineOrigin::Deletion,
            content: content.into(),
            old_line_number: Some(old_line_number),
        }
    }

    pub fn addition(content: impl Into<String>) -> Self {
        Self {
            line_origin: LineOrigin::Addition,
            content: content.into(),
            old_line_number: None,
        }
    }
}

/// Result of a global alignment.
///
/// Both sides have the same length; a position holds either a real element
/// or the strategy's gap marker.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult<T> {
    pub left: Vec<T>,
    pub right: Vec<T>,
    pub score: f64,
}

impl<T> AlignmentResult<T> {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Iterate aligned position pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&T, &T)> {
        self.left.iter().zip(self.right.iter())
    }
}

/// Text fragment aligned by content similarity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fragment {
    Text(String),
    Gap,
}

impl Fragment {
    pub fn text(s: impl Into<String>) -> Self {
        Fragment::Text(s.into())
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Fragment::Gap)
    }
}

/// Structural node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Header,
    Paragraph,
    /// Non-text block (image, table, ...) that only aligns to an identical key
    Block,
    Gap,
}

/// Structural node carrying a stable key, aligned by type and key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralNode {
    pub kind: NodeKind,
    pub key: String,
}

impl StructuralNode {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn gap() -> Self {
        Self {
            kind: NodeKind::Gap,
            key: String::new(),
        }
    }

    pub fn is_gap(&self) -> bool {
        self.kind == NodeKind::Gap
    }
}

/// Which end of the strings to keep when truncating to the shorter one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    #[default]
    Left,
    Right,
}

/// Jaccard similarity with the confidence it was derived with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    pub similarity: f64,
    pub confidence: f64,
}

impl Similarity {
    pub const NONE: Similarity = Similarity {
        similarity: 0.0,
        confidence: 0.0,
    };
    pub const IDENTICAL: Similarity = Similarity {
        similarity: 1.0,
        confidence: 1.0,
    };

    /// Similarity discounted by confidence
    pub fn weighted(&self) -> f64 {
        self.similarity * self.confidence
    }
}

/// Alignment scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParams {
    pub gap_penalty: f64,
    pub match_score: f64,
    pub band: usize,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            gap_penalty: -10.0,
            match_score: 10.0,
            band: 100,
        }
    }
}

/// Operation extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorParams {
    pub scoring: ScoringParams,
    /// Minimum Jaccard similarity between old and new hunk text for removed
    /// boundaries to count as merges rather than deletions
    pub merge_similarity_threshold: f64,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            scoring: ScoringParams::default(),
            merge_similarity_threshold: 0.5,
        }
    }
}
