//! Helpers for the UI elements ("chrome") the annotator adds to the page.

use kurbo::Rect;
use marginalia_dom::{Attribute, BaseDocument, DocumentMutator, html_name};

use crate::signal::Position;

/// Every element the annotator creates carries a class with this prefix
pub const CHROME_CLASS_PREFIX: &str = "annotator-";

/// Hides an element
pub const HIDE_CLASS: &str = "annotator-hide";

/// Whether `node` is inside annotator chrome.
///
/// Elements whose class attribute is exactly one of `skip_classes` (the highlight
/// wrappers, which share the prefix) are not chrome.
pub fn is_chrome(doc: &BaseDocument, node: usize, skip_classes: &[&str]) -> bool {
    doc.node_chain(node).into_iter().any(|id| {
        let Some(class) = doc.get_node(id).and_then(|node| node.attr("class")) else {
            return false;
        };
        !skip_classes.contains(&class) && class.starts_with(CHROME_CLASS_PREFIX)
    })
}

pub(crate) fn attr(name: &str, value: &str) -> Attribute {
    Attribute {
        name: html_name(name),
        value: value.to_string(),
    }
}

/// Create a detached `<tag class="...">` element
pub(crate) fn create_element(m: &mut DocumentMutator<'_>, tag: &str, class: &str) -> usize {
    let attrs = if class.is_empty() {
        Vec::new()
    } else {
        vec![attr("class", class)]
    };
    m.create_element(html_name(tag), attrs)
}

/// Create `<tag class="...">text</tag>` and append it to `parent`
pub(crate) fn append_element_with_text(
    m: &mut DocumentMutator<'_>,
    parent: usize,
    tag: &str,
    class: &str,
    text: &str,
) -> usize {
    let element = create_element(m, tag, class);
    m.append_children(parent, &[element]);
    m.set_text_content(element, text);
    element
}

pub(crate) fn is_hidden(doc: &BaseDocument, node: usize) -> bool {
    doc.get_node(node).is_none_or(|node| node.has_class(HIDE_CLASS))
}

/// Move an element to a page position, writing the `style` attribute and shifting its
/// layout box. `left: None` keeps the horizontal position.
pub(crate) fn place_at(m: &mut DocumentMutator<'_>, node: usize, top: f64, left: Option<f64>) {
    let style = match left {
        Some(left) => format!("top: {top}px; left: {left}px"),
        None => format!("top: {top}px"),
    };
    m.set_attribute(node, html_name("style"), &style);

    let Some(current) = m.doc.get_node(node) else {
        return;
    };
    let rect = current.final_layout;
    let parent = current
        .parent
        .map(|parent| m.doc.absolute_position(parent))
        .unwrap_or(marginalia_dom::Point::ZERO);
    let x = left.map_or(rect.x0, |left| left - parent.x);
    m.set_layout(node, Rect::from_origin_size((x, top - parent.y), rect.size()));
}

/// The first node on an event path carrying `class`
pub(crate) fn find_in_path(doc: &BaseDocument, path: &[usize], class: &str) -> Option<usize> {
    path.iter()
        .copied()
        .find(|id| doc.get_node(*id).is_some_and(|node| node.has_class(class)))
}

/// The page position of an element, `{0, 0}` when unknown
pub(crate) fn page_position(doc: &BaseDocument, node: usize) -> Position {
    let point = doc.absolute_position(node);
    Position::new(point.y, point.x)
}
