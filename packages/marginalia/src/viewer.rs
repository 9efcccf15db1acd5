//! Lists the annotations of a block next to the text they annotate.

use marginalia_dom::{BaseDocument, html_name};
use marginalia_traits::{DomEvent, DomEventData};
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationRef;
use crate::chrome::{self, HIDE_CLASS};
use crate::range;
use crate::registry::ComponentError;
use crate::signal::{Position, Signal};
use crate::store::AuthorizationPolicy;

const DELETE_PROMPT: &str = "Are you sure you want to delete this annotation?";
const HIGHLIGHTED: &str = "highlighted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Id of the viewer element
    pub element_id: String,
    /// Fail instead of creating the viewer element when the page lacks it
    pub require_existing: bool,
    /// Added to the anchor position when showing the viewer
    pub offset: Position,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            element_id: "annotator-viewer".to_string(),
            require_existing: false,
            offset: Position::new(0.0, 4.0),
        }
    }
}

struct ViewerItem {
    element: usize,
    note: usize,
    annotation: AnnotationRef,
}

pub struct Viewer {
    config: ViewerConfig,
    root: usize,
    element: usize,
    listing: usize,
    /// Whether the element was created by the viewer rather than found in the page
    owns_element: bool,
    /// Anchor of the currently listed annotations
    position: Position,
    items: Vec<ViewerItem>,
}

impl Viewer {
    pub fn new(
        doc: &mut BaseDocument,
        config: ViewerConfig,
        container: usize,
        root: usize,
    ) -> Result<Self, ComponentError> {
        let existing = doc.get_element_by_id(&config.element_id);
        if existing.is_none() && config.require_existing {
            return Err(ComponentError::MissingElement(config.element_id.clone()));
        }

        let mut m = doc.mutate();
        let element = match existing {
            Some(element) => element,
            None => {
                let element = chrome::create_element(&mut m, "div", "annotator-viewer annotator-hide");
                m.set_attribute(element, html_name("id"), &config.element_id);
                m.append_children(container, &[element]);
                element
            }
        };
        let listing = match m.doc.elements_with_class(element, "annotations-listing").first() {
            Some(listing) => *listing,
            None => {
                let listing = chrome::create_element(&mut m, "ul", "annotations-listing");
                m.append_children(element, &[listing]);
                listing
            }
        };
        if m.doc.elements_with_class(element, "close_btn").is_empty() {
            chrome::append_element_with_text(&mut m, element, "a", "close_btn", "Close");
        }
        drop(m);

        Ok(Self {
            config,
            root,
            element,
            listing,
            owns_element: existing.is_none(),
            position: Position::default(),
            items: Vec::new(),
        })
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
    }

    pub fn element(&self) -> usize {
        self.element
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_visible(&self, doc: &BaseDocument) -> bool {
        !chrome::is_hidden(doc, self.element)
    }

    /// The annotations currently listed
    pub fn annotations(&self) -> Vec<AnnotationRef> {
        self.items.iter().map(|item| item.annotation.clone()).collect()
    }

    /// List `annotations` and show the viewer next to the first one. An empty batch is
    /// ignored.
    pub fn load_annotations(
        &mut self,
        doc: &mut BaseDocument,
        annotations: Vec<AnnotationRef>,
        append: bool,
        authorization: &dyn AuthorizationPolicy,
        user: Option<&str>,
    ) -> Vec<Signal> {
        let Some(first) = annotations.first() else {
            return Vec::new();
        };

        if !append {
            self.clear(doc);
        }

        self.position = self.anchor_of(doc, first).unwrap_or_default();
        // Resolving the anchor splits text nodes
        doc.mutate().normalize(self.root);

        for annotation in annotations {
            self.render_item(doc, annotation, authorization, user);
        }

        vec![self.show(doc)]
    }

    fn anchor_of(&self, doc: &mut BaseDocument, annotation: &AnnotationRef) -> Option<Position> {
        let spec = annotation.borrow().ranges.first()?.clone();
        let normed = range::deserialize(doc, &spec, self.root)?;
        let element = doc.get_node(normed.start)?.parent?;
        // Level with the annotated text, aligned with the viewer's container
        let container = doc.get_node(self.element)?.parent.unwrap_or(self.element);
        Some(Position::new(
            chrome::page_position(doc, element).top,
            chrome::page_position(doc, container).left,
        ))
    }

    fn render_item(
        &mut self,
        doc: &mut BaseDocument,
        annotation: AnnotationRef,
        authorization: &dyn AuthorizationPolicy,
        user: Option<&str>,
    ) {
        let (can_edit, can_delete, text) = {
            let current = annotation.borrow();
            (
                authorization.permits("update", &current, user),
                authorization.permits("delete", &current, user),
                current.text.clone(),
            )
        };

        let mut m = doc.mutate();
        let element = chrome::create_element(&mut m, "li", "annotation");
        m.append_children(self.listing, &[element]);
        if can_edit {
            chrome::append_element_with_text(&mut m, element, "a", "edit_btn", "Edit");
        }
        if can_delete {
            chrome::append_element_with_text(&mut m, element, "a", "delete_btn", "Delete");
        }
        let note = chrome::append_element_with_text(&mut m, element, "div", "note", &text);
        drop(m);

        self.items.push(ViewerItem {
            element,
            note,
            annotation,
        });
    }

    fn clear(&mut self, doc: &mut BaseDocument) {
        let mut m = doc.mutate();
        for item in self.items.drain(..) {
            m.remove_and_drop_node(item.element);
        }
    }

    fn show(&mut self, doc: &mut BaseDocument) -> Signal {
        let top = self.position.top + self.config.offset.top;
        let left = self.position.left + self.config.offset.left;
        let mut m = doc.mutate();
        m.remove_class(self.element, HIDE_CLASS);
        chrome::place_at(&mut m, self.element, top, Some(left));
        Signal::ViewerOpened
    }

    /// Hide the viewer. Emits `viewer-closed` only if it was visible.
    pub fn close(&mut self, doc: &mut BaseDocument) -> Vec<Signal> {
        if !self.is_visible(doc) {
            return Vec::new();
        }
        doc.mutate().add_class(self.element, HIDE_CLASS);
        vec![Signal::ViewerClosed]
    }

    /// Remove the listed items, and the viewer element itself if the viewer created it
    pub fn destroy(&mut self, doc: &mut BaseDocument) {
        self.clear(doc);
        let mut m = doc.mutate();
        if self.owns_element {
            m.remove_and_drop_node(self.element);
        } else {
            m.add_class(self.element, HIDE_CLASS);
        }
    }

    /// Clear the selected state of every note
    pub fn dehighlight_all(&mut self, doc: &mut BaseDocument) {
        let mut m = doc.mutate();
        for item in &self.items {
            m.remove_class(item.note, HIGHLIGHTED);
        }
    }

    pub fn handle_event(&mut self, doc: &mut BaseDocument, event: &DomEvent) -> Vec<Signal> {
        if !matches!(event.data, DomEventData::Click(_)) || !event.composed_path().contains(&self.element) {
            return Vec::new();
        }
        let path = event.composed_path();

        if chrome::find_in_path(doc, path, "close_btn").is_some() {
            return self.close(doc);
        }

        let Some(index) = path
            .iter()
            .find_map(|id| self.items.iter().position(|item| item.element == *id))
        else {
            return Vec::new();
        };
        let annotation = self.items[index].annotation.clone();

        if chrome::find_in_path(doc, path, "edit_btn").is_some() {
            let position = Position::new(self.position.top + self.config.offset.top, self.position.left);
            let mut signals = self.close(doc);
            signals.push(Signal::EditAnnotation {
                annotation,
                position,
            });
            signals
        } else if chrome::find_in_path(doc, path, "delete_btn").is_some() {
            if doc.shell_provider.confirm(DELETE_PROMPT) {
                vec![Signal::DeleteAnnotation(annotation)]
            } else {
                Vec::new()
            }
        } else if path.contains(&self.items[index].note) {
            self.dehighlight_all(doc);
            doc.mutate().add_class(self.items[index].note, HIGHLIGHTED);
            vec![Signal::AnnotationSelected(annotation)]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, SerializedRange};
    use crate::store::PermitAll;
    use crate::testing::{RecordingShell, parse};
    use kurbo::Rect;
    use marginalia_traits::MouseButtonEvent;
    use std::sync::Arc;

    struct OwnerOnly;
    impl AuthorizationPolicy for OwnerOnly {
        fn permits(&self, _action: &str, annotation: &Annotation, user: Option<&str>) -> bool {
            annotation.extra.get("user").and_then(|u| u.as_str()) == user
        }
    }

    fn annotation(text: &str) -> AnnotationRef {
        Annotation::new(
            text,
            vec![SerializedRange {
                start: "/p[2]".into(),
                end: "/p[2]".into(),
                start_offset: 0,
                end_offset: 3,
            }],
        )
        .into_ref()
    }

    fn click(doc: &BaseDocument, target: usize) -> DomEvent {
        DomEvent::new(target, DomEventData::Click(MouseButtonEvent::new(0.0, 0.0)), doc.node_chain(target))
    }

    fn setup() -> (BaseDocument, Viewer) {
        let mut doc = parse("<p>one</p><p>two</p>");
        let body = doc.body().unwrap();
        let p2 = doc.element_children(body).nth(1).unwrap().id;
        let mut m = doc.mutate();
        m.set_layout(body, Rect::new(8.0, 8.0, 808.0, 608.0));
        m.set_layout(p2, Rect::new(0.0, 40.0, 800.0, 60.0));
        drop(m);
        let viewer = Viewer::new(&mut doc, ViewerConfig::default(), body, body).unwrap();
        (doc, viewer)
    }

    #[test]
    fn loading_lists_and_positions() {
        let (mut doc, mut viewer) = setup();

        let signals = viewer.load_annotations(&mut doc, vec![annotation("a"), annotation("b")], false, &PermitAll, None);
        assert_eq!(signals.iter().map(Signal::name).collect::<Vec<_>>(), ["viewer-opened"]);
        assert!(viewer.is_visible(&doc));
        assert_eq!(viewer.position(), Position::new(48.0, 8.0));
        assert_eq!(doc.tree()[viewer.element()].attr("style"), Some("top: 48px; left: 12px"));
        assert_eq!(doc.elements_with_class(viewer.element(), "annotation").len(), 2);
        assert_eq!(doc.elements_with_class(viewer.element(), "edit_btn").len(), 2);

        // Replaces the list unless appending
        viewer.load_annotations(&mut doc, vec![annotation("c")], false, &PermitAll, None);
        assert_eq!(viewer.annotations().len(), 1);
        viewer.load_annotations(&mut doc, vec![annotation("d")], true, &PermitAll, None);
        assert_eq!(viewer.annotations().len(), 2);

        assert!(viewer.load_annotations(&mut doc, Vec::new(), false, &PermitAll, None).is_empty());
        let body = doc.body().unwrap();
        let p2 = doc.element_children(body).nth(1).unwrap().id;
        assert_eq!(doc.tree()[p2].children.len(), 1);
    }

    #[test]
    fn anchored_beside_the_viewer_container() {
        let mut doc = parse("<div id=\"text\"><p>one</p><p>two</p></div><aside id=\"side\"></aside>");
        let text = doc.get_element_by_id("text").unwrap();
        let side = doc.get_element_by_id("side").unwrap();
        let p2 = doc.element_children(text).nth(1).unwrap().id;
        let mut m = doc.mutate();
        m.set_layout(text, Rect::new(8.0, 8.0, 408.0, 608.0));
        m.set_layout(p2, Rect::new(0.0, 40.0, 400.0, 60.0));
        m.set_layout(side, Rect::new(500.0, 0.0, 800.0, 600.0));
        drop(m);

        let mut viewer = Viewer::new(&mut doc, ViewerConfig::default(), side, text).unwrap();
        viewer.load_annotations(&mut doc, vec![annotation("a")], false, &PermitAll, None);
        assert_eq!(viewer.position(), Position::new(48.0, 500.0));
    }

    #[test]
    fn controls_require_permission() {
        let (mut doc, mut viewer) = setup();
        let mine = annotation("mine");
        mine.borrow_mut().extra.insert("user".into(), "alice".into());

        viewer.load_annotations(&mut doc, vec![mine, annotation("theirs")], false, &OwnerOnly, Some("alice"));
        assert_eq!(doc.elements_with_class(viewer.element(), "edit_btn").len(), 1);
        assert_eq!(doc.elements_with_class(viewer.element(), "delete_btn").len(), 1);
    }

    #[test]
    fn clicking_controls() {
        let (mut doc, mut viewer) = setup();
        let shell = Arc::new(RecordingShell::confirming(true));
        doc.set_shell_provider(shell.clone());
        viewer.load_annotations(&mut doc, vec![annotation("a")], false, &PermitAll, None);

        let note = doc.elements_with_class(viewer.element(), "note")[0];
        let click_note = click(&doc, note);
        let signals = viewer.handle_event(&mut doc, &click_note);
        assert_eq!(signals.iter().map(Signal::name).collect::<Vec<_>>(), ["annotation-selected"]);
        assert!(doc.tree()[note].has_class("highlighted"));

        let delete = doc.elements_with_class(viewer.element(), "delete_btn")[0];
        let click_delete = click(&doc, delete);
        let signals = viewer.handle_event(&mut doc, &click_delete);
        assert_eq!(signals.iter().map(Signal::name).collect::<Vec<_>>(), ["delete-annotation"]);
        assert_eq!(shell.confirmations(), [DELETE_PROMPT]);

        let edit = doc.elements_with_class(viewer.element(), "edit_btn")[0];
        let click_edit = click(&doc, edit);
        let signals = viewer.handle_event(&mut doc, &click_edit);
        assert_eq!(
            signals.iter().map(Signal::name).collect::<Vec<_>>(),
            ["viewer-closed", "edit-annotation"]
        );
        assert!(!viewer.is_visible(&doc));
        assert!(viewer.close(&mut doc).is_empty());
    }

    #[test]
    fn declined_delete_does_nothing() {
        let (mut doc, mut viewer) = setup();
        doc.set_shell_provider(Arc::new(RecordingShell::confirming(false)));
        viewer.load_annotations(&mut doc, vec![annotation("a")], false, &PermitAll, None);

        let delete = doc.elements_with_class(viewer.element(), "delete_btn")[0];
        let click_delete = click(&doc, delete);
        assert!(viewer.handle_event(&mut doc, &click_delete).is_empty());
    }

    #[test]
    fn existing_element_is_required_when_configured() {
        let mut doc = parse("<p>one</p>");
        let body = doc.body().unwrap();
        let config = ViewerConfig {
            require_existing: true,
            ..Default::default()
        };
        assert!(matches!(
            Viewer::new(&mut doc, config.clone(), body, body),
            Err(ComponentError::MissingElement(_))
        ));

        let mut doc = parse("<div id=\"annotator-viewer\" class=\"annotator-viewer annotator-hide\"></div>");
        let body = doc.body().unwrap();
        let viewer = Viewer::new(&mut doc, config, body, body).unwrap();
        assert_eq!(viewer.element(), doc.get_element_by_id("annotator-viewer").unwrap());
        assert_eq!(doc.elements_with_class(viewer.element(), "annotations-listing").len(), 1);
    }
}
