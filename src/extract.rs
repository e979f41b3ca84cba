//! Subtitle operation extraction from line diffs of annotated text.
//!
//! Annotated text marks each subtitle boundary with `@` followed by the
//! subtitle's stid (`@abcd`). A bare `@` is a new boundary that has no id
//! yet; the extractor mints ids for those in one batch. Text following a
//! marker, up to the next marker, belongs to that subtitle. Text before the
//! first marker of a line belongs to whichever subtitle is still open from
//! the previous lines.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::align::{align, AlignError};
use crate::ids::{IdError, IdSource};
use crate::models::{
    AffectedElement, DiffLine, ExtractorParams, LineOrigin, Operation, OperationType, Subtitle,
    TextAlignment,
};
use crate::scoring::{IdScoring, LineScoring};
use crate::similarity::compute_similarity;

pub const SUBTITLE_MARKER: char = '@';

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Alignment error: {0}")]
    Align(#[from] AlignError),
    #[error("Id generation error: {0}")]
    Ids(#[from] IdError),
    #[error("unhandled hunk at line {line}: {case}")]
    UnhandledHunk { line: usize, case: String },
    #[error("subtitle marker without id at line {0}")]
    UnassignedMarker(usize),
    #[error("id generator returned too few ids")]
    IdShortfall,
}

/// A subtitle marker and the text that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedSegment {
    /// `None` for a bare marker
    pub stid: Option<String>,
    pub text: String,
}

/// Annotated text split at subtitle markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedText {
    /// Text before the first marker
    pub leading: String,
    pub segments: Vec<MarkedSegment>,
}

impl AnnotatedText {
    /// Last marker's stid
    pub fn last_stid(&self) -> Option<&str> {
        self.segments.last().and_then(|s| s.stid.as_deref())
    }

    pub fn bare_marker_count(&self) -> usize {
        self.segments.iter().filter(|s| s.stid.is_none()).count()
    }
}

fn is_stid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Collapse runs of whitespace to single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split annotated text at subtitle markers. Segment text is whitespace
/// normalized.
pub fn parse_segments(text: &str) -> AnnotatedText {
    let mut leading = String::new();
    let mut segments: Vec<MarkedSegment> = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != SUBTITLE_MARKER {
            current.push(c);
            continue;
        }
        match segments.last_mut() {
            Some(seg) => seg.text = normalize(&current),
            None => leading = normalize(&current),
        }
        current.clear();

        let mut stid = String::new();
        while let Some(&next) = chars.peek() {
            if !is_stid_char(next) {
                break;
            }
            stid.push(next);
            chars.next();
        }
        segments.push(MarkedSegment {
            stid: (!stid.is_empty()).then_some(stid),
            text: String::new(),
        });
    }
    match segments.last_mut() {
        Some(seg) => seg.text = normalize(&current),
        None => leading = normalize(&current),
    }

    AnnotatedText { leading, segments }
}

/// Stids of every marker in `text`, `None` for bare markers.
pub fn stids_in_text(text: &str) -> Vec<Option<String>> {
    parse_segments(text)
        .segments
        .into_iter()
        .map(|s| s.stid)
        .collect()
}

/// Subtitle list of a fully annotated text.
pub fn subtitles_from_text(text: &str) -> Result<Vec<Subtitle>, ExtractError> {
    let mut subtitles = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for segment in parse_segments(line).segments {
            let stid = segment.stid.ok_or(ExtractError::UnassignedMarker(idx + 1))?;
            subtitles.push(Subtitle::new(stid));
        }
    }
    Ok(subtitles)
}

/// Full-context line diff of two texts, computed with the alignment engine.
pub fn diff_lines(old: &str, new: &str) -> Result<Vec<DiffLine>, AlignError> {
    let old_lines: Vec<Option<String>> = old.lines().map(|l| Some(l.to_string())).collect();
    let new_lines: Vec<Option<String>> = new.lines().map(|l| Some(l.to_string())).collect();
    let alignment = align(&old_lines, &new_lines, &LineScoring::default())?;

    let mut diff = Vec::with_capacity(alignment.len());
    let mut old_line_number = 0usize;

    for (left, right) in alignment.pairs() {
        match (left, right) {
            (Some(line), Some(_)) => {
                old_line_number += 1;
                diff.push(DiffLine::context(line.clone(), old_line_number));
            }
            (Some(line), None) => {
                old_line_number += 1;
                diff.push(DiffLine::deletion(line.clone(), old_line_number));
            }
            (None, Some(line)) => diff.push(DiffLine::addition(line.clone())),
            (None, None) => {}
        }
    }

    // Deletions before additions within each hunk
    let mut ordered = Vec::with_capacity(diff.len());
    let mut idx = 0;
    while idx < diff.len() {
        if diff[idx].line_origin == LineOrigin::Context {
            ordered.push(diff[idx].clone());
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < diff.len() && diff[idx].line_origin != LineOrigin::Context {
            idx += 1;
        }
        let hunk = &diff[start..idx];
        ordered.extend(hunk.iter().filter(|l| l.line_origin == LineOrigin::Deletion).cloned());
        ordered.extend(hunk.iter().filter(|l| l.line_origin == LineOrigin::Addition).cloned());
    }

    Ok(ordered)
}

/// One side of a hunk: the subtitle open before it, its text inside the
/// hunk, and every marked segment.
#[derive(Debug, Clone)]
struct HunkSide {
    open: Option<String>,
    leading: String,
    segments: Vec<(String, String)>,
    present: bool,
}

impl HunkSide {
    fn ids(&self) -> Vec<String> {
        self.segments.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Owner -> text, including the open subtitle's leading text
    fn texts(&self) -> HashMap<&str, &str> {
        let mut texts: HashMap<&str, &str> = HashMap::new();
        if let Some(open) = &self.open {
            texts.insert(open.as_str(), self.leading.as_str());
        }
        for (id, text) in &self.segments {
            texts.insert(id.as_str(), text.as_str());
        }
        texts
    }

    fn plain(&self) -> String {
        let mut words: Vec<&str> = self.leading.split_whitespace().collect();
        for (_, text) in &self.segments {
            words.extend(text.split_whitespace());
        }
        words.join(" ")
    }

    /// Word offset at which each marked segment starts
    fn offsets(&self) -> HashMap<&str, usize> {
        let mut offsets = HashMap::new();
        let mut pos = self.leading.split_whitespace().count();
        for (id, text) in &self.segments {
            offsets.insert(id.as_str(), pos);
            pos += text.split_whitespace().count();
        }
        offsets
    }

    /// Owner of the text right before segment `stid`
    fn preceding_owner(&self, stid: &str) -> Option<String> {
        let idx = self.segments.iter().position(|(id, _)| id == stid)?;
        if idx == 0 {
            self.open.clone()
        } else {
            Some(self.segments[idx - 1].0.clone())
        }
    }
}

#[derive(Debug, Clone)]
struct Hunk {
    line: usize,
    old: HunkSide,
    new: HunkSide,
    /// Pending ids given to this hunk's bare markers
    minted: HashSet<String>,
}

/// Boundaries that disappear or appear between a hunk's old and new side.
#[derive(Debug, Default)]
struct BoundaryChanges {
    removed: Vec<String>,
    added: Vec<String>,
}

/// Turns line diffs of annotated text into subtitle operations.
pub struct OperationExtractor<'a, G: IdSource> {
    ids: &'a mut G,
    params: ExtractorParams,
    operation_prefix: String,
    next_operation: usize,
}

impl<'a, G: IdSource> OperationExtractor<'a, G> {
    pub fn new(ids: &'a mut G, params: ExtractorParams) -> Self {
        Self {
            ids,
            params,
            operation_prefix: "op".to_string(),
            next_operation: 0,
        }
    }

    /// Prefix for generated operation ids (`<prefix>-<n>`)
    pub fn with_operation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.operation_prefix = prefix.into();
        self
    }

    /// Diff two annotated texts and extract the operations between them.
    pub fn extract_from_texts(&mut self, old: &str, new: &str) -> Result<Vec<Operation>, ExtractError> {
        let diff = diff_lines(old, new)?;
        self.extract(&diff)
    }

    /// Extract operations from a full-context diff.
    ///
    /// Every line of the old and new text must be present as context,
    /// deletion or addition; consecutive non-context lines form one hunk.
    /// Bare markers get pending ids while hunks are classified; real ids
    /// are minted in one batch only once every hunk is handled, so a
    /// failed extraction leaves the inventory untouched.
    pub fn extract(&mut self, diff: &[DiffLine]) -> Result<Vec<Operation>, ExtractError> {
        let bare_count: usize = diff
            .iter()
            .filter(|l| l.line_origin == LineOrigin::Addition)
            .map(|l| parse_segments(&l.content).bare_marker_count())
            .sum();
        let mut pending = (0..bare_count).map(pending_id);

        let mut operations = Vec::new();
        let mut old_open: Option<String> = None;
        let mut new_open: Option<String> = None;
        let mut last_old_line = 0usize;
        let mut idx = 0;

        while idx < diff.len() {
            let line = &diff[idx];
            if line.line_origin == LineOrigin::Context {
                last_old_line = line.old_line_number.unwrap_or(last_old_line + 1);
                let parsed = parse_segments(&line.content);
                if parsed.bare_marker_count() > 0 {
                    return Err(ExtractError::UnassignedMarker(last_old_line));
                }
                if let Some(last) = parsed.last_stid() {
                    old_open = Some(last.to_string());
                    new_open = Some(last.to_string());
                }
                idx += 1;
                continue;
            }

            let start = idx;
            while idx < diff.len() && diff[idx].line_origin != LineOrigin::Context {
                idx += 1;
            }
            let lines = &diff[start..idx];
            let hunk_line = lines
                .iter()
                .find_map(|l| l.old_line_number)
                .unwrap_or(last_old_line + 1);

            let hunk = build_hunk(lines, hunk_line, &old_open, &new_open, &mut pending)?;
            if let Some((last, _)) = hunk.old.segments.last() {
                old_open = Some(last.clone());
            }
            if let Some((last, _)) = hunk.new.segments.last() {
                new_open = Some(last.clone());
            }
            if let Some(n) = lines.iter().rev().find_map(|l| l.old_line_number) {
                last_old_line = n;
            }

            operations.extend(self.classify(&hunk)?);
        }

        let fresh = self.ids.generate(bare_count)?;
        if fresh.len() < bare_count {
            return Err(ExtractError::IdShortfall);
        }
        for op in &mut operations {
            if let Some(after) = op.after_stid.as_mut() {
                resolve_pending(after, &fresh)?;
            }
            for element in &mut op.affected_stids {
                resolve_pending(&mut element.stid, &fresh)?;
            }
        }

        Ok(operations)
    }

    fn next_operation_id(&mut self) -> String {
        self.next_operation += 1;
        format!("{}-{}", self.operation_prefix, self.next_operation)
    }

    fn operation(
        &mut self,
        operation_type: OperationType,
        after_stid: Option<String>,
        affected_stids: Vec<AffectedElement>,
    ) -> Operation {
        Operation {
            operation_id: self.next_operation_id(),
            operation_type,
            after_stid,
            affected_stids,
        }
    }

    /// Apply the extraction policy to one hunk, in priority order.
    fn classify(&mut self, hunk: &Hunk) -> Result<Vec<Operation>, ExtractError> {
        let changes = boundary_changes(hunk, &self.params)?;

        if !hunk.new.present {
            return Ok(self.deletion(hunk, &changes));
        }
        if !hunk.old.present {
            return Ok(self.insertion(hunk, &changes));
        }

        match (changes.removed.is_empty(), changes.added.is_empty()) {
            (true, true) => Ok(self.moves_or_content(hunk)),
            (false, true) => Ok(self.merges_or_deletes(hunk, &changes)),
            (true, false) => Ok(self.splits(hunk, &changes.added)),
            (false, false) => Err(ExtractError::UnhandledHunk {
                line: hunk.line,
                case: format!(
                    "boundaries removed ({}) and added ({}) in one hunk",
                    changes.removed.join(", "),
                    changes.added.join(", ")
                ),
            }),
        }
    }

    /// Pure deletion
    fn deletion(&mut self, hunk: &Hunk, changes: &BoundaryChanges) -> Vec<Operation> {
        if changes.removed.is_empty() {
            return self.content_changes(hunk);
        }
        self.deletes(hunk, &changes.removed)
    }

    /// One `delete` per run of contiguous removed subtitles, anchored after
    /// the subtitle that precedes the run in the new text.
    fn deletes(&mut self, hunk: &Hunk, removed: &[String]) -> Vec<Operation> {
        let removed: HashSet<&str> = removed.iter().map(String::as_str).collect();
        let old_texts = hunk.old.texts();

        let mut operations = Vec::new();
        let mut anchor = hunk.new.open.clone();
        let mut run: Vec<AffectedElement> = Vec::new();

        for (id, _) in &hunk.old.segments {
            if removed.contains(id.as_str()) {
                let before = old_texts.get(id.as_str()).copied().unwrap_or_default();
                run.push(AffectedElement::new(id.clone(), before, ""));
                continue;
            }
            if !run.is_empty() {
                let affected = std::mem::take(&mut run);
                operations.push(self.operation(OperationType::Delete, anchor.clone(), affected));
            }
            anchor = Some(id.clone());
        }
        if !run.is_empty() {
            operations.push(self.operation(OperationType::Delete, anchor, run));
        }
        operations
    }

    /// Pure insertion
    fn insertion(&mut self, hunk: &Hunk, changes: &BoundaryChanges) -> Vec<Operation> {
        let new_texts = hunk.new.texts();
        match changes.added.len() {
            0 => match &hunk.new.open {
                Some(open) => {
                    let affected = vec![AffectedElement::new(open.clone(), "", hunk.new.leading.clone())];
                    vec![self.operation(OperationType::ContentChange, None, affected)]
                }
                None => vec![self.operation(OperationType::ContentChange, None, Vec::new())],
            },
            1 => {
                let id = &changes.added[0];
                let after = new_texts.get(id.as_str()).copied().unwrap_or_default();
                let affected = vec![AffectedElement::new(id.clone(), "", after)];
                vec![self.operation(OperationType::Insert, hunk.new.open.clone(), affected)]
            }
            _ => self.splits(hunk, &changes.added),
        }
    }

    /// One `split` per new boundary, left to right, each anchored after the
    /// subtitle the new one is split from.
    fn splits(&mut self, hunk: &Hunk, added: &[String]) -> Vec<Operation> {
        let old_texts = hunk.old.texts();
        let new_texts = hunk.new.texts();

        let mut operations = Vec::new();
        for id in added {
            let after = new_texts.get(id.as_str()).copied().unwrap_or_default();
            let created = AffectedElement::new(id.clone(), "", after);

            match hunk.new.preceding_owner(id) {
                Some(owner) => {
                    let owner_before = old_texts.get(owner.as_str()).copied().unwrap_or_default();
                    let owner_after = new_texts.get(owner.as_str()).copied().unwrap_or_default();
                    let affected = vec![
                        AffectedElement::new(owner.clone(), owner_before, owner_after),
                        created,
                    ];
                    operations.push(self.operation(OperationType::Split, Some(owner), affected));
                }
                // Nothing to split from at the start of the document
                None => operations.push(self.operation(OperationType::Insert, None, vec![created])),
            }
        }
        operations
    }

    /// Boundaries removed, none added
    fn merges_or_deletes(&mut self, hunk: &Hunk, changes: &BoundaryChanges) -> Vec<Operation> {
        let similarity = compute_similarity(&hunk.old.plain(), &hunk.new.plain(), false, TextAlignment::Left);
        if similarity.similarity < self.params.merge_similarity_threshold {
            return self.deletes(hunk, &changes.removed);
        }

        let old_texts = hunk.old.texts();
        let new_texts = hunk.new.texts();
        let removed: HashSet<&str> = changes.removed.iter().map(String::as_str).collect();
        let open_survives = hunk.old.open.is_some() && hunk.old.open == hunk.new.open;

        let mut operations = Vec::new();
        let mut survivor = if open_survives { hunk.old.open.clone() } else { None };

        for (id, _) in &hunk.old.segments {
            if !removed.contains(id.as_str()) {
                survivor = Some(id.clone());
                continue;
            }
            let before = old_texts.get(id.as_str()).copied().unwrap_or_default();
            match &survivor {
                Some(s) => {
                    let s_before = old_texts.get(s.as_str()).copied().unwrap_or_default();
                    let s_after = new_texts.get(s.as_str()).copied().unwrap_or_default();
                    let affected = vec![
                        AffectedElement::new(s.clone(), s_before, s_after),
                        AffectedElement::new(id.clone(), before, ""),
                    ];
                    operations.push(self.operation(OperationType::Merge, Some(s.clone()), affected));
                }
                None => {
                    // No earlier subtitle to merge into
                    let affected = vec![AffectedElement::new(id.clone(), before, "")];
                    operations.push(self.operation(OperationType::Delete, hunk.new.open.clone(), affected));
                }
            }
        }
        operations
    }

    /// Same boundaries: either shifted boundaries or changed content
    fn moves_or_content(&mut self, hunk: &Hunk) -> Vec<Operation> {
        if hunk.old.plain() != hunk.new.plain() {
            return self.content_changes(hunk);
        }

        let old_offsets = hunk.old.offsets();
        let new_offsets = hunk.new.offsets();
        let old_texts = hunk.old.texts();
        let new_texts = hunk.new.texts();

        let mut operations = Vec::new();
        for (id, _) in &hunk.new.segments {
            let (Some(&old_pos), Some(&new_pos)) = (old_offsets.get(id.as_str()), new_offsets.get(id.as_str())) else {
                continue;
            };
            if old_pos == new_pos {
                continue;
            }
            let operation_type = if new_pos < old_pos {
                OperationType::MoveLeft
            } else {
                OperationType::MoveRight
            };

            let mut affected = Vec::with_capacity(2);
            let previous = hunk.new.preceding_owner(id);
            if let Some(prev) = &previous {
                affected.push(AffectedElement::new(
                    prev.clone(),
                    old_texts.get(prev.as_str()).copied().unwrap_or_default(),
                    new_texts.get(prev.as_str()).copied().unwrap_or_default(),
                ));
            }
            affected.push(AffectedElement::new(
                id.clone(),
                old_texts.get(id.as_str()).copied().unwrap_or_default(),
                new_texts.get(id.as_str()).copied().unwrap_or_default(),
            ));
            operations.push(self.operation(operation_type, previous, affected));
        }
        operations
    }

    /// One `content_change` covering every subtitle whose text changed
    fn content_changes(&mut self, hunk: &Hunk) -> Vec<Operation> {
        let old_texts = hunk.old.texts();
        let new_texts = hunk.new.texts();

        let mut owners: Vec<&str> = Vec::new();
        for side in [&hunk.old, &hunk.new] {
            if let Some(open) = &side.open {
                if !owners.contains(&open.as_str()) {
                    owners.push(open.as_str());
                }
            }
            for (id, _) in &side.segments {
                if !owners.contains(&id.as_str()) {
                    owners.push(id.as_str());
                }
            }
        }

        let affected: Vec<AffectedElement> = owners
            .into_iter()
            .filter_map(|id| {
                let before = old_texts.get(id).copied().unwrap_or_default();
                let after = new_texts.get(id).copied().unwrap_or_default();
                (before != after).then(|| AffectedElement::new(id, before, after))
            })
            .collect();

        if affected.is_empty() {
            return Vec::new();
        }
        vec![self.operation(OperationType::ContentChange, None, affected)]
    }
}

/// Placeholder for the `k`th bare marker. The marker character never
/// occurs inside a parsed stid, so placeholders cannot collide with ids
/// already in the text.
fn pending_id(k: usize) -> String {
    format!("{SUBTITLE_MARKER}{k}")
}

fn resolve_pending(stid: &mut String, fresh: &[String]) -> Result<(), ExtractError> {
    let Some(k) = stid.strip_prefix(SUBTITLE_MARKER) else {
        return Ok(());
    };
    let id = k
        .parse::<usize>()
        .ok()
        .and_then(|k| fresh.get(k))
        .ok_or(ExtractError::IdShortfall)?;
    *stid = id.clone();
    Ok(())
}

fn build_hunk(
    lines: &[DiffLine],
    line: usize,
    old_open: &Option<String>,
    new_open: &Option<String>,
    pending: &mut impl Iterator<Item = String>,
) -> Result<Hunk, ExtractError> {
    let join = |origin: LineOrigin| -> (bool, String) {
        let selected: Vec<&str> = lines
            .iter()
            .filter(|l| l.line_origin == origin)
            .map(|l| l.content.as_str())
            .collect();
        (!selected.is_empty(), selected.join("\n"))
    };
    let (old_present, old_text) = join(LineOrigin::Deletion);
    let (new_present, new_text) = join(LineOrigin::Addition);

    let old = parse_segments(&old_text);
    let new = parse_segments(&new_text);

    let mut old_segments = Vec::with_capacity(old.segments.len());
    for segment in old.segments {
        let stid = segment.stid.ok_or(ExtractError::UnassignedMarker(line))?;
        old_segments.push((stid, segment.text));
    }

    let mut new_segments = Vec::with_capacity(new.segments.len());
    let mut minted = HashSet::new();
    for segment in new.segments {
        let stid = match segment.stid {
            Some(stid) => stid,
            None => {
                let stid = pending.next().ok_or(ExtractError::IdShortfall)?;
                minted.insert(stid.clone());
                stid
            }
        };
        new_segments.push((stid, segment.text));
    }

    Ok(Hunk {
        line,
        old: HunkSide {
            open: old_open.clone(),
            leading: old.leading,
            segments: old_segments,
            present: old_present,
        },
        new: HunkSide {
            open: new_open.clone(),
            leading: new.leading,
            segments: new_segments,
            present: new_present,
        },
        minted,
    })
}

/// Align old and new marker ids to find kept, removed and added boundaries.
fn boundary_changes(hunk: &Hunk, params: &ExtractorParams) -> Result<BoundaryChanges, ExtractError> {
    let old_ids: Vec<Option<String>> = hunk.old.ids().into_iter().map(Some).collect();
    let new_ids: Vec<Option<String>> = hunk.new.ids().into_iter().map(Some).collect();
    let alignment = align(&old_ids, &new_ids, &IdScoring::from_params(&params.scoring))?;

    let mut changes = BoundaryChanges::default();
    for (left, right) in alignment.pairs() {
        match (left, right) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => {
                changes.removed.push(a.clone());
                changes.added.push(b.clone());
            }
            (Some(a), None) => changes.removed.push(a.clone()),
            (None, Some(b)) => changes.added.push(b.clone()),
            (None, None) => {}
        }
    }

    let old_set: HashSet<&String> = old_ids.iter().flatten().collect();
    for id in &changes.added {
        if old_set.contains(id) {
            return Err(ExtractError::UnhandledHunk {
                line: hunk.line,
                case: format!("subtitle {} reordered within the hunk", id),
            });
        }
        if !hunk.minted.contains(id) {
            return Err(ExtractError::UnhandledHunk {
                line: hunk.line,
                case: format!("existing subtitle {} appears in added text", id),
            });
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MemoryInventory, PersistentIdGenerator};

    fn generator() -> PersistentIdGenerator<MemoryInventory> {
        PersistentIdGenerator::seeded(MemoryInventory::new(["aaaa", "bbbb", "cccc", "dddd"]), 11)
    }

    fn extract(old: &str, new: &str) -> Result<Vec<Operation>, ExtractError> {
        let mut ids = generator();
        let mut extractor = OperationExtractor::new(&mut ids, ExtractorParams::default());
        extractor.extract_from_texts(old, new)
    }

    const OLD: &str = "@aaaa one two three\n@bbbb four five six\n@cccc seven eight nine";

    #[test]
    fn test_parse_segments() {
        let parsed = parse_segments("lead in @abcd first  part @ second\npart @ef_1 third");
        assert_eq!(parsed.leading, "lead in");
        assert_eq!(parsed.segments.len(), 3);
        assert_eq!(parsed.segments[0].stid.as_deref(), Some("abcd"));
        assert_eq!(parsed.segments[0].text, "first part");
        assert_eq!(parsed.segments[1].stid, None);
        assert_eq!(parsed.segments[1].text, "second part");
        assert_eq!(parsed.segments[2].stid.as_deref(), Some("ef_1"));
        assert_eq!(parsed.bare_marker_count(), 1);
    }

    #[test]
    fn test_parse_without_markers() {
        let parsed = parse_segments("just text");
        assert_eq!(parsed.leading, "just text");
        assert!(parsed.segments.is_empty());
    }

    #[test]
    fn test_subtitles_from_text() {
        let subtitles = subtitles_from_text(OLD).unwrap();
        let ids: Vec<&str> = subtitles.iter().map(|s| s.persistent_id.as_str()).collect();
        assert_eq!(ids, vec!["aaaa", "bbbb", "cccc"]);

        assert!(matches!(
            subtitles_from_text("@aaaa x\n@ y"),
            Err(ExtractError::UnassignedMarker(2))
        ));
    }

    #[test]
    fn test_diff_lines() {
        let diff = diff_lines("a\nb\nc", "a\nx\nc\nd").unwrap();
        let origins: Vec<LineOrigin> = diff.iter().map(|l| l.line_origin).collect();
        assert_eq!(
            origins,
            vec![
                LineOrigin::Context,
                LineOrigin::Deletion,
                LineOrigin::Addition,
                LineOrigin::Context,
                LineOrigin::Addition,
            ]
        );
        assert_eq!(diff[1].content, "b");
        assert_eq!(diff[1].old_line_number, Some(2));
        assert_eq!(diff[3].old_line_number, Some(3));
    }

    #[test]
    fn test_identical_texts_produce_nothing() {
        assert!(extract(OLD, OLD).unwrap().is_empty());
    }

    #[test]
    fn test_pure_insertion_single_boundary() {
        let new = "@aaaa one two three\n@ inserted words\n@bbbb four five six\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::Insert);
        assert_eq!(ops[0].after_stid.as_deref(), Some("aaaa"));
        assert_eq!(ops[0].affected_stids.len(), 1);
        assert_eq!(ops[0].affected_stids[0].before, "");
        assert_eq!(ops[0].affected_stids[0].after, "inserted words");
        assert!(!["aaaa", "bbbb", "cccc"].contains(&ops[0].affected_stids[0].stid.as_str()));
    }

    #[test]
    fn test_pure_insertion_multiple_boundaries() {
        let new = "@aaaa one two three\n@ first new @ second new\n@bbbb four five six\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.operation_type == OperationType::Split));
        assert_eq!(ops[0].after_stid.as_deref(), Some("aaaa"));
        let first_new = ops[0].affected_stids[1].stid.clone();
        assert_eq!(ops[1].after_stid.as_deref(), Some(first_new.as_str()));
        assert_eq!(ops[1].affected_stids[1].after, "second new");
    }

    #[test]
    fn test_pure_insertion_without_boundary() {
        let new = "@aaaa one two three\nmore words\n@bbbb four five six\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::ContentChange);
        assert_eq!(ops[0].affected_stids[0].stid, "aaaa");
        assert_eq!(ops[0].affected_stids[0].after, "more words");
    }

    #[test]
    fn test_pure_deletion() {
        let new = "@aaaa one two three\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::Delete);
        assert_eq!(ops[0].after_stid.as_deref(), Some("aaaa"));
        assert_eq!(ops[0].affected_stids[0].stid, "bbbb");
        assert_eq!(ops[0].affected_stids[0].before, "four five six");
        assert_eq!(ops[0].affected_stids[0].after, "");
    }

    #[test]
    fn test_deletion_at_start_has_no_anchor() {
        let new = "@bbbb four five six\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops[0].operation_type, OperationType::Delete);
        assert_eq!(ops[0].after_stid, None);
    }

    #[test]
    fn test_content_change() {
        let new = "@aaaa one two three\n@bbbb four FIVE six\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::ContentChange);
        assert_eq!(ops[0].affected_stids.len(), 1);
        assert_eq!(ops[0].affected_stids[0].stid, "bbbb");
        assert_eq!(ops[0].affected_stids[0].before, "four five six");
        assert_eq!(ops[0].affected_stids[0].after, "four FIVE six");
    }

    #[test]
    fn test_merge() {
        let new = "@aaaa one two three\n@bbbb four five six seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.operation_type, OperationType::Merge);
        assert_eq!(op.after_stid.as_deref(), Some("bbbb"));
        assert_eq!(op.affected_stids[0].stid, "bbbb");
        assert_eq!(op.affected_stids[0].after, "four five six seven eight nine");
        assert_eq!(op.affected_stids[1].stid, "cccc");
        assert_eq!(op.affected_stids[1].after, "");
    }

    #[test]
    fn test_removed_boundary_with_rewritten_text_is_delete() {
        let new = "@aaaa one two three\n@bbbb completely different words here";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::Delete);
        assert_eq!(ops[0].affected_stids[0].stid, "cccc");
        assert_eq!(ops[0].after_stid.as_deref(), Some("bbbb"));
    }

    #[test]
    fn test_split() {
        let new = "@aaaa one two three\n@bbbb four five @ six\n@cccc seven eight nine";
        let ops = extract(OLD, new).unwrap();

        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.operation_type, OperationType::Split);
        assert_eq!(op.after_stid.as_deref(), Some("bbbb"));
        assert_eq!(op.affected_stids[0].before, "four five six");
        assert_eq!(op.affected_stids[0].after, "four five");
        assert_eq!(op.affected_stids[1].before, "");
        assert_eq!(op.affected_stids[1].after, "six");
    }

    #[test]
    fn test_move_left_and_right() {
        let old = "@aaaa one two three @bbbb four five";
        let left = "@aaaa one two @bbbb three four five";
        let right = "@aaaa one two three four @bbbb five";

        let ops = extract(old, left).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::MoveLeft);
        assert_eq!(ops[0].after_stid.as_deref(), Some("aaaa"));
        assert_eq!(ops[0].affected_stids[0].stid, "aaaa");
        assert_eq!(ops[0].affected_stids[0].after, "one two");
        assert_eq!(ops[0].affected_stids[1].stid, "bbbb");
        assert_eq!(ops[0].affected_stids[1].after, "three four five");

        let ops = extract(old, right).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::MoveRight);
    }

    #[test]
    fn test_move_across_lines() {
        let old = "@aaaa one two three\n@bbbb four five six";
        let new = "@aaaa one two\n@bbbb three four five six";
        let ops = extract(old, new).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::MoveLeft);
    }

    #[test]
    fn test_operation_ids_are_sequential() {
        let mut ids = generator();
        let mut extractor =
            OperationExtractor::new(&mut ids, ExtractorParams::default()).with_operation_prefix("r1-r2");
        let new = "@aaaa one two three\n@bbbb four FIVE six\n@cccc seven eight nine\n@ tail";
        let ops = extractor.extract_from_texts(OLD, new).unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_id, "r1-r2-1");
        assert_eq!(ops[1].operation_id, "r1-r2-2");
    }

    #[test]
    fn test_reorder_is_unhandled() {
        let old = "@aaaa one @bbbb two";
        let new = "@bbbb two @aaaa one";
        let err = extract(old, new).unwrap_err();
        assert!(matches!(err, ExtractError::UnhandledHunk { line: 1, .. }));
    }

    #[test]
    fn test_known_id_in_added_text_is_unhandled() {
        let new = "@aaaa one two three\n@bbbb four five six\n@cccc seven eight nine\n@dddd ten";
        let err = extract(OLD, new).unwrap_err();
        match err {
            ExtractError::UnhandledHunk { line, case } => {
                assert_eq!(line, 4);
                assert!(case.contains("dddd"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remove_and_add_is_unhandled() {
        let new = "@aaaa one two three\n@ four five six\n@cccc seven eight nine";
        let err = extract(OLD, new).unwrap_err();
        match err {
            ExtractError::UnhandledHunk { line, case } => {
                assert_eq!(line, 2);
                assert!(case.contains("bbbb"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_extraction_mints_nothing() {
        let mut ids = generator();
        {
            let mut extractor = OperationExtractor::new(&mut ids, ExtractorParams::default());
            let new = "@aaaa one @ two three\n@ four five six\n@cccc seven eight nine";
            let err = extractor.extract_from_texts(OLD, new).unwrap_err();
            assert!(matches!(err, ExtractError::UnhandledHunk { .. }));
        }
        assert_eq!(ids.store().persist_count, 0);
        assert_eq!(ids.store().ids.len(), 4);
    }

    #[test]
    fn test_minted_ids_replace_pending_ones() {
        let mut ids = generator();
        let ops = {
            let mut extractor = OperationExtractor::new(&mut ids, ExtractorParams::default());
            let new = "@aaaa one two three\n@bbbb four @ five six\n@cccc seven eight nine";
            extractor.extract_from_texts(OLD, new).unwrap()
        };
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::Split);
        let created = &ops[0].affected_stids[1].stid;
        assert!(!created.starts_with(SUBTITLE_MARKER));
        assert!(ids.store().ids.contains(created));
    }

    #[test]
    fn test_ids_minted_in_one_batch() {
        let mut ids = generator();
        {
            let mut extractor = OperationExtractor::new(&mut ids, ExtractorParams::default());
            let new = "@ x\n@aaaa one two three\n@bbbb four five six\n@cccc seven eight nine\n@ y @ z";
            extractor.extract_from_texts(OLD, new).unwrap();
        }
        assert_eq!(ids.store().persist_count, 1);
        assert_eq!(ids.store().ids.len(), 7);
    }
}
