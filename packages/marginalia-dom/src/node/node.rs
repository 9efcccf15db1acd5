use kurbo::Rect;
use std::fmt::Write;

use super::{Attribute, ElementData};

pub struct Node {
    /// Our Id
    pub id: usize,
    /// Our parent's ID
    pub parent: Option<usize>,
    // What are our children?
    pub children: Vec<usize>,

    /// Node type (Element, TextNode, etc) specific data
    pub data: NodeData,

    /// The node's border box relative to its parent's border box, as supplied by the host's
    /// layout pass. Zero-sized until a host sets it.
    pub final_layout: Rect,
}

impl Node {
    pub(crate) fn new(id: usize, data: NodeData) -> Self {
        Self {
            id,
            parent: None,
            children: vec![],
            data,
            final_layout: Rect::ZERO,
        }
    }

    // Get the index of the current node in the parents child list
    pub fn index_of_child(&self, child_id: usize) -> Option<usize> {
        self.children.iter().position(|id| *id == child_id)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    pub fn is_text_node(&self) -> bool {
        matches!(self.data, NodeData::Text { .. })
    }

    pub fn element_data(&self) -> Option<&ElementData> {
        match self.data {
            NodeData::Element(ref data) => Some(data),
            _ => None,
        }
    }

    pub fn element_data_mut(&mut self) -> Option<&mut ElementData> {
        match self.data {
            NodeData::Element(ref mut data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<&TextNodeData> {
        match self.data {
            NodeData::Text(ref data) => Some(data),
            _ => None,
        }
    }

    pub fn text_data_mut(&mut self) -> Option<&mut TextNodeData> {
        match self.data {
            NodeData::Text(ref mut data) => Some(data),
            _ => None,
        }
    }

    /// Whether this is an element with the given tag name
    pub fn is_element_with_tag_name(&self, name: &str) -> bool {
        self.element_data().is_some_and(|el| el.tag() == name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.element_data().is_some_and(|el| el.has_class(class))
    }

    pub fn attrs(&self) -> Option<&[Attribute]> {
        Some(&self.element_data()?.attrs)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.element_data()?.attr(name)
    }

    /// The length of a text node's content in characters. Zero for other nodes.
    pub fn text_len(&self) -> usize {
        self.text_data()
            .map(|text| text.content.chars().count())
            .unwrap_or(0)
    }

    pub fn node_debug_str(&self) -> String {
        let mut s = String::new();

        let _ = match &self.data {
            NodeData::Document => write!(s, "DOCUMENT"),
            NodeData::Text(data) => {
                let preview: String = data.content.chars().take(10).collect();
                write!(s, "TEXT {preview}")
            }
            NodeData::Comment => write!(s, "COMMENT"),
            NodeData::Element(data) => {
                let class = data.attr("class").unwrap_or("");
                if !class.is_empty() {
                    write!(s, "<{} class=\"{}\">", data.name.local, class)
                } else {
                    write!(s, "<{}>", data.name.local)
                }
            }
        };
        s
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("data", &self.node_debug_str())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
}

/// The different kinds of nodes in the DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// The `Document` itself - the root node of a HTML document.
    Document,

    /// An element with attributes.
    Element(ElementData),

    /// A text node.
    Text(TextNodeData),

    /// A comment.
    Comment,
}

impl NodeData {
    pub fn downcast_element(&self) -> Option<&ElementData> {
        match self {
            Self::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn downcast_element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            Self::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment => NodeKind::Comment,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextNodeData {
    /// The textual content of the text node
    pub content: String,
}

impl TextNodeData {
    pub fn new(content: String) -> Self {
        Self { content }
    }

    /// Whether the text is empty or consists only of whitespace
    pub fn is_whitespace(&self) -> bool {
        self.content.chars().all(char::is_whitespace)
    }
}
