//! Replaying operations against a subtitle list.

use thiserror::Error;

use crate::models::{Operation, OperationType, Subtitle};
use crate::operation::{invert_all, OperationError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("anchor subtitle {anchor} not found for {operation_type} operation {operation_id}")]
    AnchorNotFound {
        anchor: String,
        operation_type: OperationType,
        operation_id: String,
    },
    #[error("subtitle {0} already present")]
    DuplicateStid(String),
    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// Apply `operations` in order to a copy of `subtitles`.
pub fn apply(operations: &[Operation], subtitles: &[Subtitle]) -> Result<Vec<Subtitle>, ApplyError> {
    let mut list = subtitles.to_vec();
    for op in operations {
        apply_one(op, &mut list)?;
    }
    Ok(list)
}

/// Undo `operations` on a list they were applied to.
pub fn revert(operations: &[Operation], subtitles: &[Subtitle]) -> Result<Vec<Subtitle>, ApplyError> {
    let inverted = invert_all(operations)?;
    apply(&inverted, subtitles)
}

/// Apply a single operation in place.
pub fn apply_one(op: &Operation, list: &mut Vec<Subtitle>) -> Result<(), ApplyError> {
    match op.operation_type {
        OperationType::Insert | OperationType::Split => insert_new_subtitles(op, list),
        OperationType::Delete | OperationType::Merge => {
            delete_subtitles(op, list);
            Ok(())
        }
        OperationType::RecordIdChange => {
            for element in &op.affected_stids {
                if let Some(sub) = list.iter_mut().find(|s| s.persistent_id == element.stid) {
                    sub.record_id = element.record_id.clone();
                }
            }
            Ok(())
        }
        // Text-only edits leave the list as is
        OperationType::MoveLeft | OperationType::MoveRight | OperationType::ContentChange => Ok(()),
    }
}

/// Insert the operation's new subtitles contiguously after its anchor.
///
/// Leading stids that are already in the list are skipped; the first
/// missing one and everything after it go in at the anchor. The list is
/// left unchanged on error.
pub fn insert_new_subtitles(op: &Operation, list: &mut Vec<Subtitle>) -> Result<(), ApplyError> {
    let present = |stid: &str| list.iter().any(|s| s.persistent_id == stid);
    let added = op.added_stids();
    let first_missing = added
        .iter()
        .position(|e| !present(&e.stid))
        .unwrap_or(added.len());
    let pending = &added[first_missing..];
    if pending.is_empty() {
        return Ok(());
    }

    if let Some(dup) = pending.iter().skip(1).find(|e| present(&e.stid)) {
        return Err(ApplyError::DuplicateStid(dup.stid.clone()));
    }
    let index = compute_insert_index(op, list)?;

    let subtitles: Vec<Subtitle> = pending
        .iter()
        .map(|e| Subtitle {
            persistent_id: e.stid.clone(),
            record_id: e.record_id.clone(),
        })
        .collect();
    list.splice(index..index, subtitles);
    Ok(())
}

/// Remove the operation's removed subtitles. Ids not in the list are skipped.
pub fn delete_subtitles(op: &Operation, list: &mut Vec<Subtitle>) {
    let removed = op.removed_stids();
    list.retain(|s| !removed.iter().any(|e| e.stid == s.persistent_id));
}

/// Index at which an insert-like operation places its first new subtitle.
pub fn compute_insert_index(op: &Operation, list: &[Subtitle]) -> Result<usize, ApplyError> {
    match &op.after_stid {
        None => Ok(0),
        Some(anchor) => list
            .iter()
            .position(|s| &s.persistent_id == anchor)
            .map(|i| i + 1)
            .ok_or_else(|| ApplyError::AnchorNotFound {
                anchor: anchor.clone(),
                operation_type: op.operation_type,
                operation_id: op.operation_id.clone(),
            }),
    }
}
