//! Operation inversion and the subtitle-list effects of each operation type.

use thiserror::Error;

use crate::models::{AffectedElement, Operation, OperationType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("operation type {0} has no inverse")]
    NoInverse(OperationType),
}

impl OperationType {
    /// The type that undoes this one, if defined.
    pub fn inverse(&self) -> Option<OperationType> {
        match self {
            OperationType::Insert => Some(OperationType::Delete),
            OperationType::Delete => Some(OperationType::Insert),
            OperationType::Merge => Some(OperationType::Split),
            OperationType::Split => Some(OperationType::Merge),
            OperationType::MoveLeft => Some(OperationType::MoveRight),
            OperationType::MoveRight => Some(OperationType::MoveLeft),
            OperationType::ContentChange => Some(OperationType::ContentChange),
            // Known gap: record id changes cannot be undone
            OperationType::RecordIdChange => None,
        }
    }
}

impl AffectedElement {
    /// Same element with `before` and `after` swapped
    pub fn inverse(&self) -> AffectedElement {
        AffectedElement {
            stid: self.stid.clone(),
            record_id: self.record_id.clone(),
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }
}

impl Operation {
    pub fn new(
        operation_id: impl Into<String>,
        operation_type: OperationType,
        after_stid: Option<String>,
        affected_stids: Vec<AffectedElement>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            operation_type,
            after_stid,
            affected_stids,
        }
    }

    /// Build the operation that undoes this one.
    ///
    /// The result is a new logical edit, so its `operation_id` is empty.
    pub fn inverse(&self) -> Result<Operation, OperationError> {
        let operation_type = self
            .operation_type
            .inverse()
            .ok_or(OperationError::NoInverse(self.operation_type))?;

        Ok(Operation {
            operation_id: String::new(),
            operation_type,
            after_stid: self.after_stid.clone(),
            affected_stids: self.affected_stids.iter().map(AffectedElement::inverse).collect(),
        })
    }

    /// Stids this operation adds to a subtitle list.
    pub fn added_stids(&self) -> &[AffectedElement] {
        match self.operation_type {
            OperationType::Insert => &self.affected_stids,
            OperationType::Split => self.affected_stids.get(1..).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Stids this operation removes from a subtitle list.
    pub fn removed_stids(&self) -> &[AffectedElement] {
        match self.operation_type {
            OperationType::Delete => &self.affected_stids,
            OperationType::Merge => self.affected_stids.get(1..).unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn adds_subtitles(&self) -> bool {
        !self.added_stids().is_empty()
    }

    pub fn removes_subtitles(&self) -> bool {
        !self.removed_stids().is_empty()
    }
}

/// Invert an operation list for backward replay: reversed order, each
/// operation inverted.
pub fn invert_all(operations: &[Operation]) -> Result<Vec<Operation>, OperationError> {
    operations.iter().rev().map(Operation::inverse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_op() -> Operation {
        Operation::new(
            "op1",
            OperationType::Split,
            Some("abcd".to_string()),
            vec![
                AffectedElement::new("abcd", "one two three", "one"),
                AffectedElement::new("efgh", "", "two three"),
            ],
        )
    }

    #[test]
    fn test_type_inverse_pairs() {
        let all = [
            OperationType::Insert,
            OperationType::Delete,
            OperationType::Merge,
            OperationType::Split,
            OperationType::MoveLeft,
            OperationType::MoveRight,
            OperationType::ContentChange,
        ];
        for t in all {
            let inv = t.inverse().unwrap();
            assert_eq!(inv.inverse(), Some(t));
        }
        assert_eq!(OperationType::Insert.inverse(), Some(OperationType::Delete));
        assert_eq!(OperationType::Merge.inverse(), Some(OperationType::Split));
        assert_eq!(OperationType::MoveLeft.inverse(), Some(OperationType::MoveRight));
        assert_eq!(
            OperationType::ContentChange.inverse(),
            Some(OperationType::ContentChange)
        );
    }

    #[test]
    fn test_inverse_swaps_before_after() {
        let op = split_op();
        let inv = op.inverse().unwrap();

        assert_eq!(inv.operation_type, OperationType::Merge);
        assert_eq!(inv.operation_id, "");
        assert_eq!(inv.after_stid, op.after_stid);
        assert_eq!(inv.affected_stids[0].before, "one");
        assert_eq!(inv.affected_stids[0].after, "one two three");
        assert_eq!(inv.affected_stids[1].before, "two three");
        assert_eq!(inv.affected_stids[1].after, "");
    }

    #[test]
    fn test_double_inverse_restores() {
        let op = split_op();
        let twice = op.inverse().unwrap().inverse().unwrap();

        assert_eq!(twice.operation_type, op.operation_type);
        assert_eq!(twice.affected_stids, op.affected_stids);
        assert_eq!(twice.operation_id, "");
    }

    #[test]
    fn test_inverse_leaves_original_untouched() {
        let op = split_op();
        let before = op.clone();
        let _ = op.inverse().unwrap();
        assert_eq!(op, before);
    }

    #[test]
    fn test_record_id_change_has_no_inverse() {
        let op = Operation::new(
            "op2",
            OperationType::RecordIdChange,
            None,
            vec![AffectedElement::new("abcd", "", "")],
        );
        assert_eq!(
            op.inverse(),
            Err(OperationError::NoInverse(OperationType::RecordIdChange))
        );
        assert!(invert_all(&[split_op(), op]).is_err());
    }

    #[test]
    fn test_added_and_removed_stids() {
        let split = split_op();
        assert_eq!(split.added_stids().len(), 1);
        assert_eq!(split.added_stids()[0].stid, "efgh");
        assert!(split.removed_stids().is_empty());

        let merge = split.inverse().unwrap();
        assert_eq!(merge.removed_stids()[0].stid, "efgh");
        assert!(merge.added_stids().is_empty());

        let content = Operation::new("c", OperationType::ContentChange, None, vec![]);
        assert!(!content.adds_subtitles());
        assert!(!content.removes_subtitles());
    }

    #[test]
    fn test_invert_all_reverses_order() {
        let insert = Operation::new(
            "a",
            OperationType::Insert,
            None,
            vec![AffectedElement::new("x", "", "text")],
        );
        let ops = vec![insert, split_op()];
        let inverted = invert_all(&ops).unwrap();

        assert_eq!(inverted[0].operation_type, OperationType::Merge);
        assert_eq!(inverted[1].operation_type, OperationType::Delete);
    }
}
