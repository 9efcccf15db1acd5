//! Range normalization and (de)serialization.
//!
//! Native selection ranges can start and end anywhere: in the middle of a text node, or
//! between the children of an element. Before a range can be highlighted or stored it is
//! *normalized*: text nodes are split so that both boundaries fall on whole text nodes,
//! and the range is limited to the annotated root.

use std::fmt;

use marginalia_dom::{BaseDocument, Boundary, LiveRange};

use crate::annotation::SerializedRange;
use crate::position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// None of the range's text lies inside the annotated root
    OutsideRoot,
    /// A position identifier did not resolve to an element
    UnresolvedPosition(String),
    /// An offset points past the text content of its element
    OffsetOutOfBounds { identifier: String, offset: usize },
    /// The range covers no text
    EmptyRange,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideRoot => write!(f, "range lies outside the annotated element"),
            Self::UnresolvedPosition(identifier) => {
                write!(f, "couldn't find an element at {identifier:?}")
            }
            Self::OffsetOutOfBounds { identifier, offset } => {
                write!(f, "offset {offset} is past the end of {identifier:?}")
            }
            Self::EmptyRange => write!(f, "range covers no text"),
        }
    }
}

impl std::error::Error for RangeError {}

/// A range whose boundaries are whole text nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedRange {
    /// The nearest element containing both `start` and `end`
    pub common_ancestor: usize,
    /// The first text node of the range
    pub start: usize,
    /// The last text node of the range
    pub end: usize,
}

/// The first text node at or after `node` in document order (descending into `node`)
fn first_text_at_or_after(doc: &BaseDocument, node: usize) -> Option<usize> {
    let mut current = node;
    loop {
        if doc.get_node(current)?.is_text_node() {
            return Some(current);
        }
        if let Some(text) = doc.text_nodes_in(current).first() {
            return Some(*text);
        }
        current = doc.next_node_skipping_children(current)?;
    }
}

fn resolve_start(doc: &BaseDocument, boundary: &Boundary) -> Option<(usize, usize)> {
    let node = doc.get_node(boundary.node)?;
    if node.is_text_node() {
        return Some((node.id, boundary.offset.min(node.text_len())));
    }
    let text = match node.children.get(boundary.offset) {
        Some(child) => first_text_at_or_after(doc, *child)?,
        None => first_text_at_or_after(doc, doc.next_node_skipping_children(node.id)?)?,
    };
    Some((text, 0))
}

fn resolve_end(doc: &BaseDocument, boundary: &Boundary) -> Option<(usize, usize)> {
    let node = doc.get_node(boundary.node)?;
    if node.is_text_node() {
        return Some((node.id, boundary.offset.min(node.text_len())));
    }
    let text = match boundary.offset.checked_sub(1) {
        Some(before) => {
            let child = *node.children.get(before).or(node.children.last())?;
            match doc.text_nodes_in(child).last() {
                Some(text) => *text,
                None => doc.previous_text_node(child, 0)?,
            }
        }
        None => doc.previous_text_node(node.id, 0)?,
    };
    Some((text, doc.get_node(text)?.text_len()))
}

/// Normalize `raw` and limit it to the subtree of `root`.
///
/// Text nodes containing a boundary are split so the range starts and ends on whole
/// nodes. The end boundary is split first: splitting the start first would shift the
/// end offset when both fall in the same text node.
pub fn normalize(
    doc: &mut BaseDocument,
    raw: &LiveRange,
    root: usize,
) -> Result<NormalizedRange, RangeError> {
    let (mut start, mut start_offset) = resolve_start(doc, &raw.start).ok_or(RangeError::EmptyRange)?;
    let (mut end, end_offset) = resolve_end(doc, &raw.end).ok_or(RangeError::EmptyRange)?;

    if start == end && start_offset >= end_offset {
        return Err(RangeError::EmptyRange);
    }

    // A start at the very end of a text node really starts in the next one
    if start != end && start_offset == doc.tree()[start].text_len() {
        start = doc.next_text_node(start, 0).ok_or(RangeError::EmptyRange)?;
        start_offset = 0;
    }

    let mut mutator = doc.mutate();
    if end_offset == 0 {
        // Nothing of the end node is selected
        end = mutator.doc.previous_text_node(end, 0).ok_or(RangeError::EmptyRange)?;
    } else if end_offset < mutator.doc.tree()[end].text_len() {
        mutator.split_text_node(end, end_offset);
    }

    if start_offset > 0 {
        if let Some(tail) = mutator.split_text_node(start, start_offset) {
            if start == end {
                end = tail;
            }
            start = tail;
        }
    }
    drop(mutator);

    limit(doc, start, end, root)
}

/// Restrict the text nodes from `start` to `end` (inclusive) to those inside `root`
fn limit(
    doc: &BaseDocument,
    start: usize,
    end: usize,
    root: usize,
) -> Result<NormalizedRange, RangeError> {
    let ancestor = doc.common_ancestor(start, end).ok_or(RangeError::OutsideRoot)?;
    let texts = doc.text_nodes_in(ancestor);
    let from = texts.iter().position(|id| *id == start).ok_or(RangeError::EmptyRange)?;
    let to = texts.iter().position(|id| *id == end).ok_or(RangeError::EmptyRange)?;
    if from > to {
        return Err(RangeError::EmptyRange);
    }

    let inside: Vec<usize> = texts[from..=to]
        .iter()
        .copied()
        .filter(|id| doc.is_inclusive_ancestor(root, *id))
        .collect();
    let (Some(first), Some(last)) = (inside.first(), inside.last()) else {
        return Err(RangeError::OutsideRoot);
    };

    let mut common_ancestor = doc.common_ancestor(*first, *last).ok_or(RangeError::OutsideRoot)?;
    if doc.tree()[common_ancestor].is_text_node() {
        common_ancestor = doc.tree()[common_ancestor]
            .parent
            .ok_or(RangeError::OutsideRoot)?;
    }

    Ok(NormalizedRange {
        common_ancestor,
        start: *first,
        end: *last,
    })
}

impl NormalizedRange {
    /// The text nodes covered by the range, in document order
    pub fn text_nodes(&self, doc: &BaseDocument) -> Vec<usize> {
        let texts = doc.text_nodes_in(self.common_ancestor);
        let from = texts.iter().position(|id| *id == self.start);
        let to = texts.iter().position(|id| *id == self.end);
        match (from, to) {
            (Some(from), Some(to)) if from <= to => texts[from..=to].to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn text(&self, doc: &BaseDocument) -> String {
        self.text_nodes(doc)
            .into_iter()
            .filter_map(|id| doc.tree()[id].text_data())
            .map(|text| text.content.as_str())
            .collect()
    }

    /// A live range spanning exactly the range's text nodes
    pub fn to_live_range(&self, doc: &BaseDocument) -> LiveRange {
        let end_len = doc.get_node(self.end).map_or(0, |node| node.text_len());
        LiveRange::new(Boundary::new(self.start, 0), Boundary::new(self.end, end_len))
    }

    /// Convert into position identifiers and character offsets relative to `root`.
    ///
    /// Offsets are counted from the nearest ancestor element that carries none of
    /// `ignore_classes`, so that highlight wrappers do not affect stored positions.
    pub fn serialize(
        &self,
        doc: &BaseDocument,
        root: usize,
        ignore_classes: &[&str],
    ) -> Result<SerializedRange, RangeError> {
        let (start, start_offset) = serialize_boundary(doc, self.start, root, ignore_classes, false)?;
        let (end, end_offset) = serialize_boundary(doc, self.end, root, ignore_classes, true)?;
        Ok(SerializedRange {
            start,
            end,
            start_offset,
            end_offset,
        })
    }
}

fn serialize_boundary(
    doc: &BaseDocument,
    text: usize,
    root: usize,
    ignore_classes: &[&str],
    is_end: bool,
) -> Result<(String, usize), RangeError> {
    let mut parent = doc.tree()[text].parent.ok_or(RangeError::OutsideRoot)?;
    while parent != root && ignore_classes.iter().any(|class| doc.tree()[parent].has_class(class)) {
        parent = doc.tree()[parent].parent.ok_or(RangeError::OutsideRoot)?;
    }

    let identifier = position::identifier_for(doc, parent, root).ok_or(RangeError::OutsideRoot)?;

    let mut offset = 0;
    for id in doc.text_nodes_in(parent) {
        if id == text {
            if is_end {
                offset += doc.tree()[id].text_len();
            }
            return Ok((identifier, offset));
        }
        offset += doc.tree()[id].text_len();
    }
    Err(RangeError::OutsideRoot)
}

/// Resolve an identifier and character offset into a text boundary
fn deserialize_boundary(
    doc: &BaseDocument,
    identifier: &str,
    offset: usize,
    root: usize,
    is_end: bool,
) -> Result<Boundary, RangeError> {
    let element = position::resolve(doc, identifier, root)
        .ok_or_else(|| RangeError::UnresolvedPosition(identifier.to_string()))?;

    // An end offset names the character before the boundary
    let target = offset as i64 - i64::from(is_end);
    let mut length: i64 = 0;
    for text in doc.text_nodes_in(element) {
        let len = doc.tree()[text].text_len() as i64;
        if length + len > target {
            return Ok(Boundary::new(text, (offset as i64 - length) as usize));
        }
        length += len;
    }

    Err(RangeError::OffsetOutOfBounds {
        identifier: identifier.to_string(),
        offset,
    })
}

fn try_deserialize(
    doc: &mut BaseDocument,
    spec: &SerializedRange,
    root: usize,
) -> Result<NormalizedRange, RangeError> {
    let end = deserialize_boundary(doc, &spec.end, spec.end_offset, root, true)?;
    let start = deserialize_boundary(doc, &spec.start, spec.start_offset, root, false)?;
    normalize(doc, &LiveRange::new(start, end), root)
}

/// Rebuild a normalized range from its serialized form.
///
/// Returns `None` (and logs a warning) when the document no longer contains the
/// described position.
pub fn deserialize(
    doc: &mut BaseDocument,
    spec: &SerializedRange,
    root: usize,
) -> Option<NormalizedRange> {
    match try_deserialize(doc, spec, root) {
        Ok(range) => Some(range),
        Err(err) => {
            tracing::warn!(?spec, %err, "could not resolve stored range");
            None
        }
    }
}
