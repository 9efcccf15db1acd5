use std::collections::HashSet;

use kurbo::Rect;

use crate::util::byte_offset;
use crate::{Attribute, BaseDocument, ElementData, NodeData, QualName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendTextErr {
    /// The node is not a text node
    NotTextNode,
}

pub struct DocumentMutator<'doc> {
    /// Document is public as an escape hatch, but users of this API should ideally avoid using it
    /// and prefer exposing additional functionality in DocumentMutator.
    pub doc: &'doc mut BaseDocument,

    // Tracked nodes for deferred processing when mutations have completed
    id_nodes: HashSet<usize>,
    /// Whether nodes were dropped, which may leave the native selection pointing at freed nodes
    nodes_dropped: bool,
}

impl Drop for DocumentMutator<'_> {
    fn drop(&mut self) {
        self.flush(); // Defined at bottom of file
    }
}

impl DocumentMutator<'_> {
    pub fn new<'doc>(doc: &'doc mut BaseDocument) -> DocumentMutator<'doc> {
        DocumentMutator {
            doc,
            id_nodes: HashSet::new(),
            nodes_dropped: false,
        }
    }

    pub fn node_has_parent(&self, node_id: usize) -> bool {
        self.doc.nodes[node_id].parent.is_some()
    }

    pub fn previous_sibling_id(&self, node_id: usize) -> Option<usize> {
        let parent = &self.doc.nodes[self.doc.nodes[node_id].parent?];
        let idx = parent.index_of_child(node_id)?;
        idx.checked_sub(1).map(|idx| parent.children[idx])
    }

    pub fn next_sibling_id(&self, node_id: usize) -> Option<usize> {
        let parent = &self.doc.nodes[self.doc.nodes[node_id].parent?];
        let idx = parent.index_of_child(node_id)?;
        parent.children.get(idx + 1).copied()
    }

    pub fn last_child_id(&self, node_id: usize) -> Option<usize> {
        self.doc.nodes[node_id].children.last().copied()
    }

    pub fn element_name(&self, node_id: usize) -> Option<&QualName> {
        self.doc.nodes[node_id].element_data().map(|el| &el.name)
    }

    pub fn create_comment_node(&mut self) -> usize {
        self.doc.create_node(NodeData::Comment)
    }

    pub fn create_text_node(&mut self, text: &str) -> usize {
        self.doc.create_text_node(text)
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> usize {
        let data = ElementData::new(name, attrs);
        let has_id = data.id.is_some();
        let id = self.doc.create_node(NodeData::Element(data));

        // If the node has an "id" attribute, store it in the ID map.
        if has_id {
            self.id_nodes.insert(id);
        }

        id
    }

    /// Remove all of the children from old_parent_id and append them to new_parent_id
    pub fn reparent_children(&mut self, old_parent_id: usize, new_parent_id: usize) {
        let child_ids = std::mem::take(&mut self.doc.nodes[old_parent_id].children);
        for child_id in &child_ids {
            self.doc.nodes[*child_id].parent = None;
        }
        self.append_children(new_parent_id, &child_ids);
    }

    pub fn append_children(&mut self, parent_id: usize, child_ids: &[usize]) {
        self.doc.append(parent_id, child_ids);
    }

    pub fn replace_node_with(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        self.doc.insert_before(anchor_node_id, new_node_ids);
        self.doc.detach(anchor_node_id);
    }

    /// Detach the node from its parent. The node (and its subtree) stays alive and can be
    /// reinserted elsewhere.
    pub fn remove_node(&mut self, node_id: usize) {
        self.doc.detach(node_id);
    }

    /// Detach the node and free it along with its whole subtree
    pub fn remove_and_drop_node(&mut self, node_id: usize) {
        if self.doc.remove_and_drop_node(node_id).is_some() {
            self.nodes_dropped = true;
        }
    }

    pub fn remove_node_if_unparented(&mut self, node_id: usize) {
        if let Some(node) = self.doc.get_node(node_id) {
            if node.parent.is_none() {
                self.remove_and_drop_node(node_id);
            }
        }
    }

    pub fn insert_nodes_after(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        match self.next_sibling_id(anchor_node_id) {
            Some(next_sibling_id) => {
                self.doc.insert_before(next_sibling_id, new_node_ids);
            }
            None => {
                if let Some(parent_id) = self.doc.nodes[anchor_node_id].parent {
                    self.doc.append(parent_id, new_node_ids);
                }
            }
        }
    }

    pub fn insert_nodes_before(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        self.doc.insert_before(anchor_node_id, new_node_ids);
    }

    pub fn append_text_to_node(&mut self, node_id: usize, text: &str) -> Result<(), AppendTextErr> {
        match self.doc.nodes[node_id].text_data_mut() {
            Some(data) => {
                data.content += text;
                Ok(())
            }
            None => Err(AppendTextErr::NotTextNode),
        }
    }

    pub fn set_node_text(&mut self, node_id: usize, value: &str) {
        let Some(text) = self.doc.get_node_mut(node_id).and_then(|n| n.text_data_mut()) else {
            return;
        };

        if text.content != value {
            text.content.clear();
            text.content.push_str(value);
        }
    }

    /// Equivalent of setting `element.textContent`: drops all children and replaces them
    /// with a single text node (or nothing when `value` is empty).
    pub fn set_text_content(&mut self, node_id: usize, value: &str) {
        let children = self.doc.nodes[node_id].children.clone();
        for child_id in children {
            self.remove_and_drop_node(child_id);
        }
        if !value.is_empty() {
            let text_id = self.create_text_node(value);
            self.append_children(node_id, &[text_id]);
        }
    }

    pub fn add_attrs_if_missing(&mut self, node_id: usize, attrs: Vec<Attribute>) {
        let Some(element_data) = self.doc.nodes[node_id].element_data() else {
            return;
        };

        let existing_names = element_data
            .attrs
            .iter()
            .map(|e| e.name.clone())
            .collect::<HashSet<_>>();

        for attr in attrs
            .into_iter()
            .filter(|attr| !existing_names.contains(&attr.name))
        {
            self.set_attribute(node_id, attr.name, &attr.value);
        }
    }

    pub fn set_attribute(&mut self, node_id: usize, name: QualName, value: &str) {
        let node = &mut self.doc.nodes[node_id];
        let NodeData::Element(ref mut element) = node.data else {
            return;
        };

        if &*name.local == "id" {
            if let Some(old_id) = element.id.take() {
                if self.doc.nodes_to_id.get(&old_id) == Some(&node_id) {
                    self.doc.nodes_to_id.remove(&old_id);
                }
            }
            element.id = Some(value.to_string());
            self.id_nodes.insert(node_id);
        }

        element.attrs.set(name, value);
    }

    pub fn clear_attribute(&mut self, node_id: usize, name: QualName) {
        let node = &mut self.doc.nodes[node_id];
        let NodeData::Element(ref mut element) = node.data else {
            return;
        };

        // FIXME: check namespace
        element.attrs.retain(|attr| attr.name.local != name.local);

        if &*name.local == "id" {
            if let Some(old_id) = element.id.take() {
                if self.doc.nodes_to_id.get(&old_id) == Some(&node_id) {
                    self.doc.nodes_to_id.remove(&old_id);
                }
            }
        }
    }

    pub fn add_class(&mut self, node_id: usize, class: &str) {
        if let Some(element) = self.doc.nodes[node_id].element_data_mut() {
            element.add_class(class);
        }
    }

    pub fn remove_class(&mut self, node_id: usize, class: &str) {
        if let Some(element) = self.doc.nodes[node_id].element_data_mut() {
            element.remove_class(class);
        }
    }

    /// Set the node's layout box (relative to its parent's box)
    pub fn set_layout(&mut self, node_id: usize, rect: Rect) {
        if let Some(node) = self.doc.get_node_mut(node_id) {
            node.final_layout = rect;
        }
    }

    /// Split a text node at a character offset, like `Text.splitText`.
    ///
    /// The original node keeps the text before `offset`. A new text node holding the rest
    /// is inserted directly after it and its id is returned. Returns `None` when the node
    /// is not a text node or the offset is past its end.
    pub fn split_text_node(&mut self, node_id: usize, offset: usize) -> Option<usize> {
        let text = self.doc.nodes.get_mut(node_id)?.text_data_mut()?;
        if offset > text.content.chars().count() {
            return None;
        }
        let idx = byte_offset(&text.content, offset);
        let tail = text.content.split_off(idx);

        let new_id = self.create_text_node(&tail);
        if self.node_has_parent(node_id) {
            self.insert_nodes_after(node_id, &[new_id]);
        }
        Some(new_id)
    }

    /// Like `Node.normalize`: within the subtree of `node_id`, merge adjacent text nodes
    /// and drop empty ones.
    pub fn normalize(&mut self, node_id: usize) {
        let Some(node) = self.doc.get_node(node_id) else {
            return;
        };
        let children = node.children.clone();

        let mut current_text: Option<usize> = None;
        for child_id in children {
            let child = &self.doc.nodes[child_id];
            match &child.data {
                NodeData::Text(data) => {
                    if data.content.is_empty() {
                        self.remove_and_drop_node(child_id);
                        continue;
                    }
                    match current_text {
                        Some(text_id) => {
                            let content = data.content.clone();
                            let _ = self.append_text_to_node(text_id, &content);
                            self.remove_and_drop_node(child_id);
                        }
                        None => current_text = Some(child_id),
                    }
                }
                _ => {
                    current_text = None;
                    self.normalize(child_id);
                }
            }
        }
    }

    /// Replace an element with its children. Returns the moved child ids.
    pub fn unwrap_element(&mut self, node_id: usize) -> Vec<usize> {
        if !self.doc.nodes.contains(node_id) || !self.node_has_parent(node_id) {
            return Vec::new();
        }
        let children = std::mem::take(&mut self.doc.nodes[node_id].children);
        for child_id in &children {
            self.doc.nodes[*child_id].parent = None;
        }
        self.doc.insert_before(node_id, &children);
        self.remove_and_drop_node(node_id);
        children
    }

    /// Wrap `node_id` in a newly created element, which takes its place in the tree
    pub fn wrap_node(&mut self, node_id: usize, name: QualName, attrs: Vec<Attribute>) -> usize {
        let wrapper_id = self.create_element(name, attrs);
        if self.node_has_parent(node_id) {
            self.doc.insert_before(node_id, &[wrapper_id]);
        }
        self.append_children(wrapper_id, &[node_id]);
        wrapper_id
    }
}

impl<'doc> DocumentMutator<'doc> {
    pub fn flush(&mut self) {
        for id in self.id_nodes.drain() {
            let Some(id_attr) = self
                .doc
                .get_node(id)
                .and_then(|node| node.element_data())
                .and_then(|el| el.id.clone())
            else {
                continue;
            };
            self.doc.nodes_to_id.insert(id_attr, id);
        }

        if std::mem::take(&mut self.nodes_dropped) {
            let doc = &mut *self.doc;
            let nodes = &doc.nodes;
            doc.selection.retain(|range| {
                nodes.contains(range.start.node) && nodes.contains(range.end.node)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::util::html_name;
    use crate::{BaseDocument, DocumentConfig};

    fn doc_with_paragraph(text: &str) -> (BaseDocument, usize, usize) {
        let mut doc = BaseDocument::new(DocumentConfig::default());
        let mut mutator = doc.mutate();
        let p = mutator.create_element(html_name("p"), Vec::new());
        let t = mutator.create_text_node(text);
        mutator.append_children(0, &[p]);
        mutator.append_children(p, &[t]);
        drop(mutator);
        (doc, p, t)
    }

    #[test]
    fn split_then_normalize_restores_text() {
        let (mut doc, p, t) = doc_with_paragraph("Hello world");

        let tail = doc.mutate().split_text_node(t, 6).unwrap();
        assert_eq!(doc.get_node(p).unwrap().children, vec![t, tail]);
        assert_eq!(doc.get_node(t).unwrap().text_data().unwrap().content, "Hello ");
        assert_eq!(doc.get_node(tail).unwrap().text_data().unwrap().content, "world");

        doc.mutate().normalize(p);
        assert_eq!(doc.get_node(p).unwrap().children, vec![t]);
        assert_eq!(doc.text_content(p), "Hello world");
        assert!(doc.get_node(tail).is_none());
    }

    #[test]
    fn split_rejects_out_of_range_offsets() {
        let (mut doc, _, t) = doc_with_paragraph("abc");
        assert!(doc.mutate().split_text_node(t, 4).is_none());
        assert!(doc.mutate().split_text_node(t, 3).is_some());
    }

    #[test]
    fn wrap_and_unwrap() {
        let (mut doc, p, t) = doc_with_paragraph("quoted");

        let span = doc.mutate().wrap_node(t, html_name("span"), Vec::new());
        assert_eq!(doc.get_node(p).unwrap().children, vec![span]);
        assert_eq!(doc.outer_html(p), "<p><span>quoted</span></p>");

        let moved = doc.mutate().unwrap_element(span);
        assert_eq!(moved, vec![t]);
        assert!(doc.get_node(span).is_none());
        assert_eq!(doc.outer_html(p), "<p>quoted</p>");
    }

    #[test]
    fn id_attributes_are_indexed() {
        let (mut doc, p, _) = doc_with_paragraph("x");
        doc.mutate().set_attribute(p, html_name("id"), "counts");
        assert_eq!(doc.get_element_by_id("counts"), Some(p));

        doc.mutate().clear_attribute(p, html_name("id"));
        assert_eq!(doc.get_element_by_id("counts"), None);
    }

    #[test]
    fn set_text_content_replaces_children() {
        let (mut doc, p, _) = doc_with_paragraph("old");
        doc.mutate().set_text_content(p, "new");
        let children = &doc.tree()[p].children;
        assert_eq!(children.len(), 1);
        let text = &doc.tree()[children[0]];
        assert_eq!(text.text_data().map(|data| data.content.as_str()), Some("new"));
        assert_eq!(doc.text_content(p), "new");

        doc.mutate().set_text_content(p, "");
        assert!(doc.tree()[p].children.is_empty());
    }
}
