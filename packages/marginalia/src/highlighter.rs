//! Drawing highlights over annotated text.
//!
//! A highlight is a `<span>` wrapping a single text node. Annotations that have not been
//! saved yet are drawn with the temporary class and tracked so they can all be removed
//! at once.

use std::task::Poll;
use std::time::Duration;

use marginalia_dom::{BaseDocument, html_name};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::annotation::{Annotation, AnnotationRef};
use crate::chrome::attr;
use crate::range::{self, NormalizedRange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlighterConfig {
    /// Class of highlights belonging to stored annotations
    pub highlight_class: String,
    /// Class of highlights for annotations still being edited
    pub temp_highlight_class: String,
    /// Number of annotations drawn per [`DrawAll::step`]
    pub chunk_size: usize,
    /// Minimum delay between two chunks, in milliseconds
    pub chunk_delay_ms: u64,
}

impl Default for HighlighterConfig {
    fn default() -> Self {
        Self {
            highlight_class: "annotator-hl".to_string(),
            temp_highlight_class: "annotator-hl-temporary".to_string(),
            chunk_size: 10,
            chunk_delay_ms: 10,
        }
    }
}

pub struct Highlighter {
    config: HighlighterConfig,
    root: usize,
    temp_highlighted: Vec<AnnotationRef>,
}

impl Highlighter {
    pub fn new(config: HighlighterConfig, root: usize) -> Self {
        Self {
            config,
            root,
            temp_highlighted: Vec::new(),
        }
    }

    pub fn config(&self) -> &HighlighterConfig {
        &self.config
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
    }

    /// Both highlight classes; elements carrying them wrap document text
    pub fn highlight_classes(&self) -> [&str; 2] {
        [
            self.config.highlight_class.as_str(),
            self.config.temp_highlight_class.as_str(),
        ]
    }

    /// Annotations currently drawn with a temporary highlight
    pub fn temp_highlighted(&self) -> &[AnnotationRef] {
        &self.temp_highlighted
    }

    /// Wrap every non-whitespace text node of the annotation's ranges in a highlight
    /// span. Ranges that no longer resolve are skipped. Returns the created span ids.
    pub fn draw(
        &self,
        doc: &mut BaseDocument,
        annotation: &mut Annotation,
        class: Option<&str>,
    ) -> Vec<usize> {
        let class = class.unwrap_or(&self.config.highlight_class);

        // Resolve everything before wrapping: new spans shift `span[n]` positions
        let normed: Vec<NormalizedRange> = annotation
            .ranges
            .iter()
            .filter_map(|spec| range::deserialize(doc, spec, self.root))
            .collect();

        let mut attrs = vec![attr("class", class)];
        if let Some(id) = &annotation.id {
            attrs.push(attr("data-annotation-id", &id.to_string()));
        }

        let mut drawn = Vec::new();
        for normed in normed {
            let texts: Vec<usize> = normed
                .text_nodes(doc)
                .into_iter()
                .filter(|id| {
                    doc.tree()[*id]
                        .text_data()
                        .is_some_and(|text| !text.is_whitespace())
                })
                .collect();

            let mut m = doc.mutate();
            for text in texts {
                drawn.push(m.wrap_node(text, html_name("span"), attrs.clone()));
            }
        }

        tracing::trace!(id = ?annotation.id, spans = drawn.len(), "drew highlights");
        annotation.local.highlights.extend(drawn.iter().copied());
        drawn
    }

    /// Remove the annotation's highlight spans, merging the text they wrapped back into
    /// the surrounding text.
    pub fn undraw(&self, doc: &mut BaseDocument, annotation: &mut Annotation) {
        if annotation.local.highlights.is_empty() {
            return;
        }
        let [class, temp_class] = self.highlight_classes();

        let mut m = doc.mutate();
        for span in std::mem::take(&mut annotation.local.highlights) {
            let is_highlight = m.doc.is_attached(span)
                && m.doc
                    .get_node(span)
                    .is_some_and(|node| node.has_class(class) || node.has_class(temp_class));
            if !is_highlight {
                continue;
            }
            let parent = m.doc.tree()[span].parent;
            m.unwrap_element(span);
            if let Some(parent) = parent {
                m.normalize(parent);
            }
        }
    }

    pub fn redraw(
        &self,
        doc: &mut BaseDocument,
        annotation: &mut Annotation,
        class: Option<&str>,
    ) -> Vec<usize> {
        self.undraw(doc, annotation);
        self.draw(doc, annotation, class)
    }

    /// Draw an unsaved annotation with the temporary class
    pub fn draw_temporary(&mut self, doc: &mut BaseDocument, annotation: &AnnotationRef) {
        let class = self.config.temp_highlight_class.clone();
        self.draw(doc, &mut annotation.borrow_mut(), Some(&class));
        self.temp_highlighted.push(annotation.clone());
    }

    /// Highlight an annotation picked from the viewer, replacing any temporary
    /// highlights.
    pub fn draw_selected(&mut self, doc: &mut BaseDocument, annotation: &AnnotationRef) {
        self.undraw_all(doc);
        self.draw(doc, &mut annotation.borrow_mut(), None);
        self.temp_highlighted.push(annotation.clone());
    }

    /// Remove all temporary highlights
    pub fn undraw_all(&mut self, doc: &mut BaseDocument) {
        for annotation in std::mem::take(&mut self.temp_highlighted) {
            self.undraw(doc, &mut annotation.borrow_mut());
        }
    }

    /// Start drawing a batch of annotations. Drive the returned task with
    /// [`DrawAll::step`].
    pub fn draw_all(&self, annotations: Vec<AnnotationRef>) -> DrawAll {
        DrawAll {
            pending: annotations,
            chunk_size: self.config.chunk_size.max(1),
            chunk_delay: Duration::from_millis(self.config.chunk_delay_ms),
            last_chunk: None,
            drawn: Vec::new(),
        }
    }

    /// Unwrap every highlight span under the root
    pub fn destroy(&mut self, doc: &mut BaseDocument) {
        self.temp_highlighted.clear();
        let spans: Vec<usize> = self
            .highlight_classes()
            .iter()
            .flat_map(|class| doc.elements_with_class(self.root, class))
            .collect();

        let mut m = doc.mutate();
        for span in spans {
            let parent = m.doc.get_node(span).and_then(|node| node.parent);
            m.unwrap_element(span);
            if let Some(parent) = parent {
                m.normalize(parent);
            }
        }
    }
}

/// A batch draw that is performed a chunk at a time, so that drawing hundreds of
/// annotations does not block the host's event loop.
pub struct DrawAll {
    pending: Vec<AnnotationRef>,
    chunk_size: usize,
    chunk_delay: Duration,
    last_chunk: Option<Instant>,
    drawn: Vec<usize>,
}

impl DrawAll {
    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Draw the next chunk if enough time has passed since the previous one.
    ///
    /// Resolves with the ids of every span drawn by the batch once all annotations have
    /// been drawn.
    pub fn step(&mut self, doc: &mut BaseDocument, highlighter: &Highlighter) -> Poll<Vec<usize>> {
        if self.last_chunk.is_some_and(|last| last.elapsed() < self.chunk_delay) {
            return Poll::Pending;
        }

        let count = self.chunk_size.min(self.pending.len());
        for annotation in self.pending.drain(..count) {
            let drawn = highlighter.draw(doc, &mut annotation.borrow_mut(), None);
            self.drawn.extend(drawn);
        }
        self.last_chunk = Some(Instant::now());

        if self.pending.is_empty() {
            Poll::Ready(std::mem::take(&mut self.drawn))
        } else {
            Poll::Pending
        }
    }
}
