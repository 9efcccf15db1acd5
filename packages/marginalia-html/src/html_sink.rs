//! An implementation for Html5ever's sink trait, allowing us to parse HTML into a DOM.

use html5ever::ParseOpts;
use html5ever::tokenizer::TokenizerOpts;
use html5ever::tree_builder::TreeBuilderOpts;
use std::borrow::Cow;
use std::cell::{Ref, RefCell, RefMut};

use html5ever::{
    QualName,
    tendril::{StrTendril, TendrilSink},
    tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink},
};
use marginalia_dom::node::Attribute;
use marginalia_dom::{BaseDocument, DocumentMutator};

/// Convert an html5ever Attribute which uses tendril for its value to a DOM Attribute
/// which uses String.
fn html5ever_to_dom_attr(attr: html5ever::Attribute) -> Attribute {
    Attribute {
        name: attr.name,
        value: attr.value.to_string(),
    }
}

/// Builds parsed markup straight into a [`BaseDocument`]. Doctypes, quirks modes and
/// templates are dropped: annotation positions only depend on elements and text.
pub struct DocumentHtmlParser<'doc> {
    document_mutator: RefCell<DocumentMutator<'doc>>,
}

impl<'doc> DocumentHtmlParser<'doc> {
    #[track_caller]
    fn mutr(&self) -> RefMut<'_, DocumentMutator<'doc>> {
        self.document_mutator.borrow_mut()
    }

    /// Merge `text` into `neighbour` when it is a text node. Otherwise create a new text
    /// node for the caller to insert.
    fn text_node_unless_merged(&self, neighbour: Option<usize>, text: &str) -> Option<usize> {
        let merged = neighbour.is_some_and(|id| self.mutr().append_text_to_node(id, text).is_ok());
        (!merged).then(|| self.mutr().create_text_node(text))
    }
}

impl DocumentHtmlParser<'_> {
    pub fn new(doc: &mut BaseDocument) -> DocumentHtmlParser<'_> {
        DocumentHtmlParser {
            document_mutator: RefCell::new(doc.mutate()),
        }
    }

    pub fn parse_into_doc<'d>(doc: &'d mut BaseDocument, html: &str) -> &'d mut BaseDocument {
        let sink = Self::new(doc);

        let is_xhtml_doc = html.starts_with("<?xml")
            || html.starts_with("<!DOCTYPE")
                && html
                    .lines()
                    .next()
                    .is_some_and(|first_line| first_line.contains("XHTML") || first_line.contains("xhtml"));

        // Reading from an in-memory byte slice cannot fail
        if is_xhtml_doc {
            let _ = xml5ever::driver::parse_document(sink, Default::default())
                .from_utf8()
                .read_from(&mut html.as_bytes());
        } else {
            let opts = ParseOpts {
                tokenizer: TokenizerOpts::default(),
                tree_builder: TreeBuilderOpts {
                    exact_errors: false,
                    scripting_enabled: false,
                    iframe_srcdoc: false,
                    drop_doctype: true,
                    quirks_mode: QuirksMode::NoQuirks,
                },
            };
            let _ = html5ever::parse_document(sink, opts)
                .from_utf8()
                .read_from(&mut html.as_bytes());
        }

        doc
    }
}

impl<'b> TreeSink for DocumentHtmlParser<'b> {
    type Output = ();

    // we use the ID of the nodes in the tree as the handle
    type Handle = usize;

    type ElemName<'a>
        = Ref<'a, QualName>
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        drop(self.document_mutator.into_inner());
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        #[cfg(feature = "tracing")]
        tracing::debug!("html parse error: {_msg}");
    }

    fn get_document(&self) -> Self::Handle {
        0
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        Ref::map(self.document_mutator.borrow(), |docm| {
            docm.element_name(*target)
                .expect("TreeSink::elem_name called on a node which is not an element!")
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs.into_iter().map(html5ever_to_dom_attr).collect();
        self.mutr().create_element(name, attrs)
    }

    // Comments and processing instructions are kept as opaque placeholders so that
    // element sibling indexes match the source markup
    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        self.mutr().create_comment_node()
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.mutr().create_comment_node()
    }

    fn append(&self, parent_id: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(id) => self.mutr().append_children(*parent_id, &[id]),
            NodeOrText::AppendText(text) => {
                let last = self.mutr().last_child_id(*parent_id);
                if let Some(id) = self.text_node_unless_merged(last, &text) {
                    self.mutr().append_children(*parent_id, &[id]);
                }
            }
        }
    }

    // The tree builder never leaves a text node after the insertion point
    fn append_before_sibling(&self, sibling_id: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        match new_node {
            NodeOrText::AppendNode(id) => self.mutr().insert_nodes_before(*sibling_id, &[id]),
            NodeOrText::AppendText(text) => {
                let previous = self.mutr().previous_sibling_id(*sibling_id);
                if let Some(id) = self.text_node_unless_merged(previous, &text) {
                    self.mutr().insert_nodes_before(*sibling_id, &[id]);
                }
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if self.mutr().node_has_parent(*element) {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&self, _: StrTendril, _: StrTendril, _: StrTendril) {}

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, _: QuirksMode) {}

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        let attrs = attrs.into_iter().map(html5ever_to_dom_attr).collect();
        self.mutr().add_attrs_if_missing(*target, attrs);
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.mutr().remove_node(*target);
    }

    fn reparent_children(&self, old_parent_id: &Self::Handle, new_parent_id: &Self::Handle) {
        self.mutr()
            .reparent_children(*old_parent_id, *new_parent_id);
    }
}

#[test]
fn parses_some_html() {
    use marginalia_dom::DocumentConfig;

    let html = "<!DOCTYPE html><html><body><h1 id=\"title\">hello world</h1></body></html>";
    let mut doc = BaseDocument::new(DocumentConfig::default());
    DocumentHtmlParser::parse_into_doc(&mut doc, html);

    let h1 = doc.get_element_by_id("title").unwrap();
    assert!(doc.get_node(h1).unwrap().is_element_with_tag_name("h1"));
    assert_eq!(doc.text_content(h1), "hello world");
    assert_eq!(doc.body().and_then(|b| doc.get_node(b)).unwrap().children, vec![h1]);
}

#[test]
fn recovers_from_malformed_markup() {
    use marginalia_dom::DocumentConfig;

    // An unclosed paragraph holding a comment, then text fostered out of a table
    let html = "<body><p>one<!-- note --><p>two</p><div><table>loose<tr><td>cell</td></tr></table></div></body>";
    let mut doc = BaseDocument::new(DocumentConfig::default());
    DocumentHtmlParser::parse_into_doc(&mut doc, html);

    let body = doc.body().unwrap();
    let tags: Vec<_> = doc
        .element_children(body)
        .filter_map(|node| node.element_data().map(|el| el.name.local.to_string()))
        .collect();
    assert_eq!(tags, ["p", "p", "div"]);

    let first = doc.first_element_with_tag(body, "p").unwrap();
    assert_eq!(doc.text_content(first), "one");
    assert_eq!(doc.get_node(first).unwrap().children.len(), 2);

    let div = doc.first_element_with_tag(body, "div").unwrap();
    let children = &doc.get_node(div).unwrap().children;
    assert_eq!(children.len(), 2);
    assert_eq!(doc.text_content(children[0]), "loose");
    assert!(doc.get_node(children[1]).unwrap().is_element_with_tag_name("table"));
}
