//! Subtitle Revisions Library
//!
//! Tracks subtitle boundaries (uniquely identified markers in a document)
//! across revisions. Two revisions of an annotated document are diffed, the
//! diff is turned into typed, invertible operations (insert, delete, merge,
//! split, boundary moves, content changes), and those operations can be
//! replayed forward or backward against subtitle lists.
//!
//! Underneath sits a generic Needleman-Wunsch aligner with pluggable scoring
//! strategies, a Jaccard similarity scorer and a collision-free persistent
//! id generator.
//!
//! # Example
//!
//! ```no_run
//! use subtitle_revisions::prelude::*;
//! use std::path::Path;
//!
//! let old = std::fs::read_to_string("doc.r1.txt").unwrap();
//! let new = std::fs::read_to_string("doc.r2.txt").unwrap();
//!
//! // Ids for new boundaries are checked against an inventory file
//! let mut ids = PersistentIdGenerator::new(FileInventory::new(Path::new("ids.txt")));
//! let mut extractor = OperationExtractor::new(&mut ids, ExtractorParams::default());
//! let operations = extractor.extract_from_texts(&old, &new).unwrap();
//!
//! // Replay forward, then back again
//! let before = subtitles_from_text(&old).unwrap();
//! let after = apply(&operations, &before).unwrap();
//! assert_eq!(revert(&operations, &after).unwrap(), before);
//! ```
//!
//! # Alignment Example
//!
//! ```
//! use subtitle_revisions::prelude::*;
//!
//! let old: Vec<Option<String>> = ["a", "b", "c"].iter().map(|s| Some(s.to_string())).collect();
//! let new: Vec<Option<String>> = ["a", "c"].iter().map(|s| Some(s.to_string())).collect();
//!
//! let result = align(&old, &new, &IdScoring::subtitle_stid(100)).unwrap();
//! assert_eq!(result.right[1], None);
//! ```

pub mod align;
pub mod apply;
pub mod compare;
pub mod db;
pub mod extract;
pub mod ids;
pub mod models;
pub mod operation;
pub mod output;
pub mod scoring;
pub mod similarity;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::align::{align, AlignError, FnScoring, ScoringStrategy};
    pub use crate::apply::{apply, apply_one, revert, ApplyError};
    pub use crate::compare::{extract_log, extract_many, RevisionPair};
    pub use crate::db::{SqliteStore, StoreError};
    pub use crate::extract::{
        diff_lines, parse_segments, stids_in_text, subtitles_from_text, ExtractError,
        OperationExtractor,
    };
    pub use crate::ids::{
        FileInventory, IdError, IdSource, InventoryStore, MemoryInventory, PersistentIdGenerator,
    };
    pub use crate::models::{
        AffectedElement, AlignmentResult, DiffLine, ExtractorParams, Fragment, LineOrigin,
        NodeKind, Operation, OperationLog, OperationType, ScoringParams, Similarity,
        StructuralNode, Subtitle, TextAlignment,
    };
    pub use crate::operation::{invert_all, OperationError};
    pub use crate::output::{
        read_json, read_json_file, write_csv, write_csv_file, write_json, write_json_file,
        OutputError,
    };
    pub use crate::scoring::{ContentScoring, IdScoring, LineScoring, StructuralScoring};
    pub use crate::similarity::compute_similarity;
}

// Re-export commonly used types at the crate root
pub use models::{AffectedElement, Operation, OperationLog, OperationType, Subtitle};
