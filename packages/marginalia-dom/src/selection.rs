//! The native text selection of a document.
//!
//! A [`Selection`] holds zero or more [`LiveRange`]s. Boundaries are expressed the same
//! way the DOM expresses them: a node plus an offset, where the offset counts characters
//! inside a text node and children inside any other node.

use crate::BaseDocument;

/// One endpoint of a range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub node: usize,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: usize, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A range of the document between two boundaries, start before end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl LiveRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// A range covering the whole of the given node's contents
    pub fn select_node_contents(doc: &BaseDocument, node_id: usize) -> Option<Self> {
        let node = doc.get_node(node_id)?;
        let len = if node.is_text_node() {
            node.text_len()
        } else {
            node.children.len()
        };
        Some(Self::new(Boundary::new(node_id, 0), Boundary::new(node_id, len)))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// The deepest node containing both boundaries
    pub fn common_ancestor(&self, doc: &BaseDocument) -> Option<usize> {
        doc.common_ancestor(self.start.node, self.end.node)
    }

    /// The text covered by the range
    pub fn text(&self, doc: &BaseDocument) -> String {
        let Some(ancestor) = self.common_ancestor(doc) else {
            return String::new();
        };

        let start_text = doc.boundary_text_position(&self.start);
        let end_text = doc.boundary_text_position(&self.end);

        let mut out = String::new();
        let mut seen_start = start_text.is_none();
        for text_id in doc.text_nodes_in(ancestor) {
            let content = doc.nodes[text_id]
                .text_data()
                .map(|t| t.content.as_str())
                .unwrap_or("");
            let len = content.chars().count();

            let from = match start_text {
                Some((node, offset)) if node == text_id => {
                    seen_start = true;
                    offset
                }
                _ => 0,
            };
            if !seen_start {
                continue;
            }
            let to = match end_text {
                Some((node, offset)) if node == text_id => offset,
                _ => len,
            };
            out.extend(content.chars().skip(from).take(to.saturating_sub(from)));
            if matches!(end_text, Some((node, _)) if node == text_id) {
                break;
            }
        }
        out
    }
}

/// The document's native selection
#[derive(Clone, Debug, Default)]
pub struct Selection {
    ranges: Vec<LiveRange>,
}

impl Selection {
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn get_range_at(&self, index: usize) -> Option<&LiveRange> {
        self.ranges.get(index)
    }

    pub fn ranges(&self) -> &[LiveRange] {
        &self.ranges
    }

    pub fn add_range(&mut self, range: LiveRange) {
        self.ranges.push(range);
    }

    pub fn remove_all_ranges(&mut self) {
        self.ranges.clear();
    }

    /// Whether there is no selection or every range is collapsed
    pub fn is_collapsed(&self) -> bool {
        self.ranges.iter().all(LiveRange::is_collapsed)
    }

    pub fn retain(&mut self, f: impl FnMut(&LiveRange) -> bool) {
        self.ranges.retain(f);
    }
}

impl BaseDocument {
    /// Map a boundary onto a (text node, char offset) pair.
    ///
    /// Element boundaries resolve to the start of the first text node at or after the
    /// referenced child, or the end of the last text node before it.
    pub fn boundary_text_position(&self, boundary: &Boundary) -> Option<(usize, usize)> {
        let node = self.get_node(boundary.node)?;
        if node.is_text_node() {
            return Some((node.id, boundary.offset.min(node.text_len())));
        }

        if let Some(child) = node.children.get(boundary.offset) {
            if self.nodes[*child].is_text_node() {
                return Some((*child, 0));
            }
            if let Some(text) = self.text_nodes_in(*child).first() {
                return Some((*text, 0));
            }
            return self
                .next_text_node(*child, 0)
                .map(|text| (text, 0));
        }

        // Offset points past the last child: the end of the node's last text node
        match self.text_nodes_in(node.id).last() {
            Some(text) => Some((*text, self.nodes[*text].text_len())),
            None => self
                .previous_text_node(node.id, 0)
                .map(|text| (text, self.nodes[text].text_len())),
        }
    }

    /// Replace the native selection with a single range
    pub fn set_selection(&mut self, range: LiveRange) {
        self.selection.remove_all_ranges();
        self.selection.add_range(range);
    }
}
