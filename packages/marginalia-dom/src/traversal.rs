use crate::{BaseDocument, Node};

#[derive(Clone)]
/// An pre-order tree traverser for a [BaseDocument](crate::document::BaseDocument).
pub struct TreeTraverser<'a> {
    doc: &'a BaseDocument,
    stack: Vec<usize>,
}

impl<'a> TreeTraverser<'a> {
    /// Creates a new tree traverser for the given document which starts at the root node.
    pub fn new(doc: &'a BaseDocument) -> Self {
        Self::new_with_root(doc, 0)
    }

    /// Creates a new tree traverser for the given document which starts at the specified node.
    pub fn new_with_root(doc: &'a BaseDocument, root: usize) -> Self {
        let mut stack = Vec::with_capacity(32);
        stack.push(root);
        TreeTraverser { doc, stack }
    }
}
impl Iterator for TreeTraverser<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.doc.get_node(id)?;
        self.stack.extend(node.children.iter().rev());
        Some(id)
    }
}

#[derive(Clone)]
/// An ancestor traverser for a [BaseDocument](crate::document::BaseDocument).
pub struct AncestorTraverser<'a> {
    doc: &'a BaseDocument,
    current: usize,
}
impl<'a> AncestorTraverser<'a> {
    /// Creates a new ancestor traverser for the given document and node ID.
    pub fn new(doc: &'a BaseDocument, node_id: usize) -> Self {
        AncestorTraverser {
            doc,
            current: node_id,
        }
    }
}
impl Iterator for AncestorTraverser<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current_node = self.doc.get_node(self.current)?;
        self.current = current_node.parent?;
        Some(self.current)
    }
}

impl BaseDocument {
    /// Collect the chain of ancestors of a node, starting with the node itself and ending
    /// with the document node.
    pub fn node_chain(&self, node_id: usize) -> Vec<usize> {
        let mut chain = Vec::with_capacity(16);
        chain.push(node_id);
        chain.extend(AncestorTraverser::new(self, node_id));
        chain
    }

    /// The nearest node which is an inclusive ancestor of both `a` and `b`
    pub fn common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let chain_b = self.node_chain(b);
        self.node_chain(a)
            .into_iter()
            .find(|id| chain_b.contains(id))
    }

    /// All text nodes under `root` (inclusive) in document order
    pub fn text_nodes_in(&self, root: usize) -> Vec<usize> {
        TreeTraverser::new_with_root(self, root)
            .filter(|id| self.nodes[*id].is_text_node())
            .collect()
    }

    /// The next node in document order after `node_id`, without descending into `node_id`
    pub fn next_node_skipping_children(&self, node_id: usize) -> Option<usize> {
        let mut current = node_id;
        loop {
            let node = self.get_node(current)?;
            let parent = self.get_node(node.parent?)?;
            let idx = parent.index_of_child(current)?;
            if let Some(next) = parent.children.get(idx + 1) {
                return Some(*next);
            }
            current = parent.id;
        }
    }

    /// The next node in document order (pre-order successor)
    pub fn next_node(&self, node_id: usize) -> Option<usize> {
        let node = self.get_node(node_id)?;
        match node.children.first() {
            Some(first) => Some(*first),
            None => self.next_node_skipping_children(node_id),
        }
    }

    /// The previous node in document order (pre-order predecessor)
    pub fn previous_node(&self, node_id: usize) -> Option<usize> {
        let node = self.get_node(node_id)?;
        let parent = self.get_node(node.parent?)?;
        let idx = parent.index_of_child(node_id)?;
        if idx == 0 {
            return Some(parent.id);
        }
        let mut current = parent.children[idx - 1];
        while let Some(last) = self.get_node(current)?.children.last() {
            current = *last;
        }
        Some(current)
    }

    /// The first text node after `node_id` in document order, limited to the subtree of `root`
    pub fn next_text_node(&self, node_id: usize, root: usize) -> Option<usize> {
        let mut current = self.next_node(node_id)?;
        loop {
            if !self.is_inclusive_ancestor(root, current) {
                return None;
            }
            if self.nodes[current].is_text_node() {
                return Some(current);
            }
            current = self.next_node(current)?;
        }
    }

    /// The last text node before `node_id` in document order, limited to the subtree of `root`
    pub fn previous_text_node(&self, node_id: usize, root: usize) -> Option<usize> {
        let mut current = self.previous_node(node_id)?;
        loop {
            if !self.is_inclusive_ancestor(root, current) {
                return None;
            }
            if self.nodes[current].is_text_node() {
                return Some(current);
            }
            current = self.previous_node(current)?;
        }
    }

    /// Iterate over the element children of a node
    pub fn element_children(&self, node_id: usize) -> impl Iterator<Item = &Node> + '_ {
        self.get_node(node_id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .map(|id| &self.nodes[*id])
            .filter(|node| node.is_element())
    }
}

#[cfg(test)]
mod tests {
    use crate::util::html_name;
    use crate::{BaseDocument, DocumentConfig};

    /// `<div><p>ab<b>cd</b></p><p>ef</p></div>`
    fn fixture() -> (BaseDocument, [usize; 8]) {
        let mut doc = BaseDocument::new(DocumentConfig::default());
        let mut m = doc.mutate();
        let div = m.create_element(html_name("div"), Vec::new());
        let p1 = m.create_element(html_name("p"), Vec::new());
        let ab = m.create_text_node("ab");
        let b = m.create_element(html_name("b"), Vec::new());
        let cd = m.create_text_node("cd");
        let p2 = m.create_element(html_name("p"), Vec::new());
        let ef = m.create_text_node("ef");
        m.append_children(0, &[div]);
        m.append_children(div, &[p1, p2]);
        m.append_children(p1, &[ab, b]);
        m.append_children(b, &[cd]);
        m.append_children(p2, &[ef]);
        drop(m);
        (doc, [0, div, p1, ab, b, cd, p2, ef])
    }

    #[test]
    fn document_order() {
        let (doc, ids) = fixture();
        let order: Vec<usize> = super::TreeTraverser::new(&doc).collect();
        assert_eq!(order, ids.to_vec());
    }

    #[test]
    fn text_node_navigation() {
        let (doc, [_, div, p1, ab, _, cd, p2, ef]) = fixture();
        assert_eq!(doc.text_nodes_in(div), vec![ab, cd, ef]);
        assert_eq!(doc.next_text_node(ab, div), Some(cd));
        assert_eq!(doc.next_text_node(cd, div), Some(ef));
        assert_eq!(doc.next_text_node(cd, p1), None);
        assert_eq!(doc.previous_text_node(ef, div), Some(cd));
        assert_eq!(doc.previous_text_node(ef, p2), None);
    }

    #[test]
    fn common_ancestors() {
        let (doc, [_, div, p1, ab, _, cd, _, ef]) = fixture();
        assert_eq!(doc.common_ancestor(ab, cd), Some(p1));
        assert_eq!(doc.common_ancestor(cd, ef), Some(div));
        assert_eq!(doc.common_ancestor(ab, ab), Some(ab));
    }
}
