use crate::node::{Node, NodeData, TextNodeData};
use crate::traversal::{AncestorTraverser, TreeTraverser};
use crate::util::Point;
use crate::{DocumentConfig, DocumentMutator, Selection};
use marginalia_traits::Viewport;
use marginalia_traits::net::{DummyNetProvider, NetProvider, SharedProvider};
use marginalia_traits::shell::{DummyShellProvider, ShellProvider};
use rustc_hash::FxHashMap;
use slab::Slab;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

pub struct BaseDocument {
    /// ID of the document
    id: usize,

    // Config
    /// Base url for resolving relative endpoint urls
    pub(crate) base_url: Option<Url>,
    // Viewport details such as the dimensions and HiDPI scale
    pub(crate) viewport: Viewport,

    /// A slab-backed tree of nodes. Node 0 is always the `Document` node.
    pub(crate) nodes: Slab<Node>,

    /// Map of element `id` attributes to node ids for fast lookups
    pub(crate) nodes_to_id: FxHashMap<String, usize>,

    /// The native text selection
    pub(crate) selection: Selection,
    /// The node which recieved a mousedown event (if any)
    pub(crate) mousedown_node_id: Option<usize>,
    /// The node which currently has focus (if any). Keyboard events target this node.
    pub(crate) focus_node_id: Option<usize>,

    // Service providers
    /// Network provider. Used to fetch counts and annotations.
    pub net_provider: SharedProvider,
    /// Shell provider. Used to request redraws and to talk to the user.
    pub shell_provider: Arc<dyn ShellProvider>,
}

impl BaseDocument {
    /// Create a new (empty) [`BaseDocument`] with the specified configuration
    pub fn new(config: DocumentConfig) -> Self {
        static ID_GENERATOR: AtomicUsize = AtomicUsize::new(1);

        let id = ID_GENERATOR.fetch_add(1, Ordering::SeqCst);

        let base_url = config.base_url.and_then(|url| Url::parse(&url).ok());
        let net_provider = config
            .net_provider
            .unwrap_or_else(|| Arc::new(DummyNetProvider));
        let shell_provider = config
            .shell_provider
            .unwrap_or_else(|| Arc::new(DummyShellProvider));

        let mut doc = Self {
            id,
            base_url,
            viewport: config.viewport.unwrap_or_default(),
            nodes: Slab::new(),
            nodes_to_id: FxHashMap::default(),
            selection: Selection::default(),
            mousedown_node_id: None,
            focus_node_id: None,
            net_provider,
            shell_provider,
        };

        // Initialise document with root Document node
        doc.create_node(NodeData::Document);

        doc
    }

    /// Set the Document's networking provider
    pub fn set_net_provider(&mut self, net_provider: Arc<dyn NetProvider>) {
        self.net_provider = net_provider;
    }

    /// Set the Document's shell provider
    pub fn set_shell_provider(&mut self, shell_provider: Arc<dyn ShellProvider>) {
        self.shell_provider = shell_provider;
    }

    /// Set base url for resolving relative urls
    pub fn set_base_url(&mut self, url: &str) -> Result<(), url::ParseError> {
        self.base_url = Some(Url::parse(url)?);
        Ok(())
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Resolve a possibly-relative url against the document's base url
    pub fn resolve_url(&self, raw: &str) -> Option<Url> {
        match &self.base_url {
            Some(base) => base.join(raw).ok(),
            None => Url::parse(raw).ok(),
        }
    }

    pub fn tree(&self) -> &Slab<Node> {
        &self.nodes
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn get_node(&self, node_id: usize) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_node_mut(&mut self, node_id: usize) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn mutate<'doc>(&'doc mut self) -> DocumentMutator<'doc> {
        DocumentMutator::new(self)
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[0]
    }

    /// The `<html>` element (or whatever the document element is), if parsed
    pub fn root_element(&self) -> Option<&Node> {
        self.root_node()
            .children
            .iter()
            .map(|id| &self.nodes[*id])
            .find(|node| node.is_element())
    }

    /// The `<body>` element, falling back to the document element
    pub fn body(&self) -> Option<usize> {
        TreeTraverser::new(self)
            .find(|id| self.nodes[*id].is_element_with_tag_name("body"))
            .or_else(|| self.root_element().map(|node| node.id))
    }

    pub fn create_node(&mut self, node_data: NodeData) -> usize {
        let entry = self.nodes.vacant_entry();
        let id = entry.key();
        entry.insert(Node::new(id, node_data));
        id
    }

    pub fn create_text_node(&mut self, text: &str) -> usize {
        let content = text.to_string();
        let data = NodeData::Text(TextNodeData::new(content));
        self.create_node(data)
    }

    /// Whether `node_id` is connected to the document node
    pub fn is_attached(&self, node_id: usize) -> bool {
        if node_id == 0 {
            return true;
        }
        self.nodes.contains(node_id)
            && AncestorTraverser::new(self, node_id).any(|ancestor| ancestor == 0)
    }

    /// Whether `node_id` is `ancestor_id` or one of its descendants
    pub fn is_inclusive_ancestor(&self, ancestor_id: usize, node_id: usize) -> bool {
        node_id == ancestor_id
            || AncestorTraverser::new(self, node_id).any(|ancestor| ancestor == ancestor_id)
    }

    /// The concatenated text of all descendant text nodes
    pub fn text_content(&self, node_id: usize) -> String {
        let mut out = String::new();
        self.write_text_content(node_id, &mut out);
        out
    }

    fn write_text_content(&self, node_id: usize, out: &mut String) {
        let Some(node) = self.get_node(node_id) else {
            return;
        };
        match &node.data {
            NodeData::Text(data) => out.push_str(&data.content),
            NodeData::Element(..) | NodeData::Document => {
                for child_id in node.children.iter() {
                    self.write_text_content(*child_id, out);
                }
            }
            NodeData::Comment => {}
        }
    }

    pub fn outer_html(&self, node_id: usize) -> String {
        let mut output = String::new();
        self.write_outer_html(node_id, &mut output);
        output
    }

    pub fn inner_html(&self, node_id: usize) -> String {
        let mut output = String::new();
        if let Some(node) = self.get_node(node_id) {
            for child_id in &node.children {
                self.write_outer_html(*child_id, &mut output);
            }
        }
        output
    }

    fn write_outer_html(&self, node_id: usize, writer: &mut String) {
        let Some(node) = self.get_node(node_id) else {
            return;
        };

        match &node.data {
            NodeData::Document => {
                for &child_id in &node.children {
                    self.write_outer_html(child_id, writer);
                }
            }
            NodeData::Comment => {}
            NodeData::Text(data) => {
                writer.push_str(&html_escape::encode_text(&data.content));
            }
            NodeData::Element(data) => {
                writer.push('<');
                writer.push_str(&data.name.local);

                for attr in data.attrs() {
                    writer.push(' ');
                    writer.push_str(&attr.name.local);
                    writer.push_str("=\"");
                    writer.push_str(&html_escape::encode_double_quoted_attribute(&attr.value));
                    writer.push('"');
                }
                writer.push('>');

                for &child_id in &node.children {
                    self.write_outer_html(child_id, writer);
                }

                writer.push_str("</");
                writer.push_str(&data.name.local);
                writer.push('>');
            }
        }
    }

    /// The position of the node's border box relative to the page origin
    pub fn absolute_position(&self, node_id: usize) -> Point<f64> {
        let mut point = Point::ZERO;
        let mut current = self.get_node(node_id);
        while let Some(node) = current {
            point.x += node.final_layout.x0;
            point.y += node.final_layout.y0;
            current = node.parent.and_then(|id| self.get_node(id));
        }
        point
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn get_focussed_node_id(&self) -> Option<usize> {
        self.focus_node_id
            .filter(|id| self.nodes.contains(*id))
    }

    pub fn set_focus_to(&mut self, focus_node_id: usize) -> bool {
        if self.focus_node_id == Some(focus_node_id) {
            return false;
        }
        self.focus_node_id = Some(focus_node_id);
        true
    }

    pub fn clear_focus(&mut self) {
        self.focus_node_id = None;
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Insert `new_node_ids` into the anchor's parent, directly before the anchor
    pub(crate) fn insert_before(&mut self, anchor_node_id: usize, new_node_ids: &[usize]) {
        let Some(parent_id) = self.nodes[anchor_node_id].parent else {
            return;
        };

        for &id in new_node_ids {
            self.detach(id);
        }

        let parent = &mut self.nodes[parent_id];
        let idx = parent
            .index_of_child(anchor_node_id)
            .unwrap_or(parent.children.len());
        parent
            .children
            .splice(idx..idx, new_node_ids.iter().copied());

        for &id in new_node_ids {
            self.nodes[id].parent = Some(parent_id);
        }
    }

    /// Append `new_node_ids` to the children of `parent_id`
    pub(crate) fn append(&mut self, parent_id: usize, new_node_ids: &[usize]) {
        for &id in new_node_ids {
            self.detach(id);
            self.nodes[parent_id].children.push(id);
            self.nodes[id].parent = Some(parent_id);
        }
    }

    /// Remove the node from its parent's child list. The node stays in the slab.
    pub(crate) fn detach(&mut self, node_id: usize) {
        if let Some(parent_id) = self.nodes[node_id].parent.take() {
            self.nodes[parent_id].children.retain(|id| *id != node_id);
        }
    }

    /// Detach the node and free it and all of its descendants
    pub(crate) fn remove_and_drop_node(&mut self, node_id: usize) -> Option<Node> {
        fn remove_ignoring_parent(doc: &mut BaseDocument, node_id: usize) -> Option<Node> {
            let node = doc.nodes.try_remove(node_id);
            if let Some(node) = &node {
                if let Some(id_attr) = node.element_data().and_then(|el| el.id.as_ref()) {
                    if doc.nodes_to_id.get(id_attr) == Some(&node_id) {
                        doc.nodes_to_id.remove(id_attr);
                    }
                }
                for &child in &node.children {
                    remove_ignoring_parent(doc, child);
                }
            }
            node
        }

        if !self.nodes.contains(node_id) {
            return None;
        }
        self.detach(node_id);
        remove_ignoring_parent(self, node_id)
    }

    pub fn print_tree(&self) {
        crate::util::walk_tree(self, 0, self.root_node());
    }

    pub fn print_subtree(&self, node_id: usize) {
        if let Some(node) = self.get_node(node_id) {
            crate::util::walk_tree(self, 0, node);
        }
    }
}

impl AsRef<BaseDocument> for BaseDocument {
    fn as_ref(&self) -> &BaseDocument {
        self
    }
}

impl AsMut<BaseDocument> for BaseDocument {
    fn as_mut(&mut self) -> &mut BaseDocument {
        self
    }
}
