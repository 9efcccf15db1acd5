use std::ops::{Deref, DerefMut};

use crate::DocumentHtmlParser;

use marginalia_dom::{BaseDocument, DocumentConfig};
use marginalia_traits::{DomEvent, UiEvent};

/// A [`BaseDocument`] whose contents were parsed from an HTML string
pub struct HtmlDocument {
    inner: BaseDocument,
}

impl Deref for HtmlDocument {
    type Target = BaseDocument;
    fn deref(&self) -> &BaseDocument {
        &self.inner
    }
}
impl DerefMut for HtmlDocument {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
impl From<HtmlDocument> for BaseDocument {
    fn from(doc: HtmlDocument) -> BaseDocument {
        doc.inner
    }
}

impl HtmlDocument {
    /// Parse HTML (or XHTML) into an [`HtmlDocument`]
    pub fn from_html(html: &str, config: DocumentConfig) -> Self {
        let mut doc = BaseDocument::new(config);
        DocumentHtmlParser::parse_into_doc(&mut doc, html);
        HtmlDocument { inner: doc }
    }

    /// Hit test and convert a window-level event into DOM events
    pub fn handle_event(&mut self, event: UiEvent) -> Vec<DomEvent> {
        self.inner.ui_to_dom_events(event)
    }

    /// Convert the [`HtmlDocument`] into it's inner [`BaseDocument`]
    pub fn into_inner(self) -> BaseDocument {
        self.into()
    }
}
