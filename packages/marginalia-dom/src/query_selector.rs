use std::fmt;

use markup5ever::LocalName;
use smallvec::SmallVec;

use crate::BaseDocument;

/// A single `tag:nth-of-type(n)` compound selector. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NthOfTypeStep {
    pub tag: LocalName,
    pub index: usize,
}

impl NthOfTypeStep {
    pub fn new(tag: &str, index: usize) -> Self {
        Self {
            tag: LocalName::from(tag.to_ascii_lowercase()),
            index,
        }
    }
}

impl fmt::Display for NthOfTypeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:nth-of-type({})", self.tag, self.index)
    }
}

/// A chain of [`NthOfTypeStep`]s joined with the child combinator,
/// e.g. `p:nth-of-type(1) > ol:nth-of-type(2)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NthOfTypeSelector {
    pub steps: SmallVec<[NthOfTypeStep; 4]>,
}

impl NthOfTypeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: NthOfTypeStep) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve the selector as a chain of child steps starting at `root`
    pub fn query_from(&self, doc: &BaseDocument, root: usize) -> Option<usize> {
        doc.query_nth_of_type(root, self)
    }
}

impl fmt::Display for NthOfTypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl BaseDocument {
    /// Find the node with the specified id attribute (if one exists)
    pub fn get_element_by_id(&self, id: &str) -> Option<usize> {
        self.nodes_to_id.get(id).copied()
    }

    /// Find the element matching `selector`, where the first step is matched against the
    /// element children of `root`.
    ///
    /// Returns `None` for an empty selector or when any step fails to match.
    pub fn query_nth_of_type(&self, root: usize, selector: &NthOfTypeSelector) -> Option<usize> {
        if selector.is_empty() {
            return None;
        }

        let mut current = root;
        for step in &selector.steps {
            current = self
                .element_children(current)
                .filter(|node| node.element_data().is_some_and(|el| el.name.local == step.tag))
                .nth(step.index.checked_sub(1)?)?
                .id;
        }
        Some(current)
    }

    /// The 1-based position of an element among its same-tag siblings
    pub fn nth_of_type_index(&self, node_id: usize) -> Option<usize> {
        let node = self.get_node(node_id)?;
        let tag = &node.element_data()?.name.local;
        let parent = node.parent?;
        let position = self
            .element_children(parent)
            .filter(|sibling| sibling.element_data().is_some_and(|el| &el.name.local == tag))
            .position(|sibling| sibling.id == node_id)?;
        Some(position + 1)
    }

    /// All elements under `root` (inclusive) carrying `class`, in document order
    pub fn elements_with_class(&self, root: usize, class: &str) -> SmallVec<[usize; 32]> {
        crate::TreeTraverser::new_with_root(self, root)
            .filter(|id| self.nodes[*id].has_class(class))
            .collect()
    }

    /// The first element under `root` (inclusive) with the given tag name
    pub fn first_element_with_tag(&self, root: usize, tag: &str) -> Option<usize> {
        crate::TreeTraverser::new_with_root(self, root)
            .find(|id| self.nodes[*id].is_element_with_tag_name(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::html_name;
    use crate::{DocumentConfig, TreeTraverser};

    #[test]
    fn renders_child_combinator_chain() {
        let mut selector = NthOfTypeSelector::new();
        selector.push(NthOfTypeStep::new("p", 1));
        selector.push(NthOfTypeStep::new("OL", 2));
        assert_eq!(
            selector.to_string(),
            "p:nth-of-type(1) > ol:nth-of-type(2)"
        );
    }

    #[test]
    fn resolves_same_tag_siblings() {
        let mut doc = BaseDocument::new(DocumentConfig::default());
        let mut m = doc.mutate();
        let body = m.create_element(html_name("body"), Vec::new());
        let p1 = m.create_element(html_name("p"), Vec::new());
        let div = m.create_element(html_name("div"), Vec::new());
        let p2 = m.create_element(html_name("p"), Vec::new());
        m.append_children(0, &[body]);
        m.append_children(body, &[p1, div, p2]);
        drop(m);

        let mut selector = NthOfTypeSelector::new();
        selector.push(NthOfTypeStep::new("p", 2));
        assert_eq!(selector.query_from(&doc, body), Some(p2));
        assert_eq!(doc.nth_of_type_index(p2), Some(2));
        assert_eq!(doc.nth_of_type_index(div), Some(1));

        let mut missing = NthOfTypeSelector::new();
        missing.push(NthOfTypeStep::new("p", 3));
        assert_eq!(missing.query_from(&doc, body), None);
        assert_eq!(NthOfTypeSelector::new().query_from(&doc, body), None);

        let order: Vec<usize> = TreeTraverser::new_with_root(&doc, body).collect();
        assert_eq!(order, vec![body, p1, div, p2]);
    }
}
