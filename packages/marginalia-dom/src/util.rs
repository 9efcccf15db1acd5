use markup5ever::{LocalName, Namespace, QualName};

use crate::node::{Node, NodeData};
use crate::BaseDocument;

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A point
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Point<T> {
    /// The x coordinate
    pub x: T,
    /// The y coordinate
    pub y: T,
}

impl Point<f64> {
    pub const ZERO: Self = Point { x: 0.0, y: 0.0 };
}

/// A `QualName` in the HTML namespace
pub fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

/// Convert a character offset into a byte offset into `s`, clamped to the end of the string.
pub fn byte_offset(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len())
}

// Debug print a subtree
pub fn walk_tree(doc: &BaseDocument, indent: usize, node: &Node) {
    // Skip all-whitespace text nodes entirely
    if let NodeData::Text(data) = &node.data {
        if data.is_whitespace() {
            return;
        }
    }

    print!("{}", " ".repeat(indent));
    let id = node.id;
    match &node.data {
        NodeData::Document => println!("#Document {id}"),

        NodeData::Text(data) => {
            let content = data.content.trim();
            if content.chars().count() > 10 {
                let preview: String = content.chars().take(10).collect();
                println!("#text {id}: {}...", preview.escape_default())
            } else {
                println!("#text {id}: {}", content.escape_default())
            }
        }

        NodeData::Comment => println!("<!-- COMMENT {id} -->"),

        NodeData::Element(data) => {
            print!("<{} {id}", data.name.local);
            for attr in data.attrs.iter() {
                print!(" {}=\"{}\"", attr.name.local, attr.value);
            }
            if !node.children.is_empty() {
                println!(">");
            } else {
                println!("/>");
            }
        }
    }

    if !node.children.is_empty() {
        for child_id in node.children.iter() {
            if let Some(child) = doc.get_node(*child_id) {
                walk_tree(doc, indent + 2, child);
            }
        }

        if let NodeData::Element(data) = &node.data {
            println!("{}</{}>", " ".repeat(indent), data.name.local);
        }
    }
}

#[test]
fn byte_offsets_respect_char_boundaries() {
    let s = "héllo";
    assert_eq!(byte_offset(s, 0), 0);
    assert_eq!(byte_offset(s, 2), 3);
    assert_eq!(byte_offset(s, 5), s.len());
    assert_eq!(byte_offset(s, 99), s.len());
}
