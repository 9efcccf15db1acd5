//! Drives an annotator the way a host would: pointer events in, store requests out.

use std::sync::{Arc, Mutex};

use marginalia::{
    Annotation, AnnotationStore, Annotator, AnnotatorConfig, Collaborators, Highlighter,
    HighlighterConfig, SerializedRange, StoreCallback, StoreResponse, range,
};
use marginalia_dom::{BaseDocument, Boundary, DocumentConfig, LiveRange};
use marginalia_html::HtmlDocument;
use marginalia_traits::{DomEvent, DomEventData, MouseButtonEvent};
use serde_json::json;

/// Saves whatever it is given under the next integer id
#[derive(Clone, Default)]
struct Payloads(Arc<Mutex<Vec<Annotation>>>);

impl AnnotationStore for Payloads {
    fn create(&self, mut payload: Annotation, done: StoreCallback) {
        let mut saved = self.0.lock().unwrap();
        saved.push(payload.clone());
        payload.id = Some((saved.len() as i64).into());
        drop(saved);
        done(Ok(StoreResponse {
            annotation: Some(payload),
            message: None,
        }));
    }

    fn update(&self, payload: Annotation, done: StoreCallback) {
        self.0.lock().unwrap().push(payload);
        done(Ok(StoreResponse::default()));
    }

    fn delete(&self, _payload: Annotation, done: StoreCallback) {
        done(Ok(StoreResponse::default()));
    }
}

fn parse(html: &str) -> BaseDocument {
    HtmlDocument::from_html(html, DocumentConfig::default()).into_inner()
}

fn annotator(html: &str, store: &Payloads) -> Annotator {
    let config = AnnotatorConfig::from_json(
        r#"{"components": ["text-selector", "highlighter", "editor", "viewer"]}"#,
    )
    .unwrap();
    let collaborators = Collaborators {
        store: Box::new(store.clone()),
        ..Default::default()
    };
    Annotator::new(parse(html), config, collaborators).unwrap()
}

fn drag_select(annotator: &mut Annotator, from: usize, to: usize) {
    let doc = annotator.document();
    let p = doc.first_element_with_tag(annotator.root(), "p").unwrap();
    let text = doc.text_nodes_in(p)[0];
    let chain = doc.node_chain(p);

    annotator.handle_dom_event(DomEvent::new(
        p,
        DomEventData::MouseDown(MouseButtonEvent::new(10.0, 100.0)),
        chain.clone(),
    ));
    annotator
        .document_mut()
        .set_selection(LiveRange::new(Boundary::new(text, from), Boundary::new(text, to)));
    annotator.handle_dom_event(DomEvent::new(
        p,
        DomEventData::MouseUp(MouseButtonEvent::new(60.0, 100.0)),
        chain,
    ));
}

fn click_editor_button(annotator: &mut Annotator, class: &str) {
    let editor = annotator.components().editor.as_ref().unwrap().element();
    let doc = annotator.document();
    let button = doc.elements_with_class(editor, class)[0];
    let event = DomEvent::new(
        button,
        DomEventData::Click(MouseButtonEvent::new(0.0, 0.0)),
        doc.node_chain(button),
    );
    annotator.handle_dom_event(event);
}

#[test]
fn hello_world_is_saved_with_its_range() {
    let store = Payloads::default();
    let mut annotator = annotator("<p>Hello world</p>", &store);

    drag_select(&mut annotator, 6, 11);
    annotator.set_editor_text("greeting");
    click_editor_button(&mut annotator, "annotator-add");
    assert!(annotator.poll());

    let saved = store.0.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(
        serde_json::to_value(&saved[0]).unwrap(),
        json!({
            "text": "greeting",
            "quote": "world",
            "ranges": [{"start": "/p[1]", "end": "/p[1]", "start_offset": 6, "end_offset": 11}],
        })
    );
}

#[test]
fn selection_then_deselection_saves_nothing() {
    let store = Payloads::default();
    let mut annotator = annotator("<p>Hello world</p>", &store);

    drag_select(&mut annotator, 4, 4);
    assert!(annotator.take_editor_session().is_none());
    assert!(!annotator.components().editor.as_ref().unwrap().is_open());
    assert!(!annotator.poll());
    assert!(store.0.lock().unwrap().is_empty());
}

#[test]
fn cancelling_leaves_the_text_untouched() {
    let store = Payloads::default();
    let mut annotator = annotator("<p>Hello world</p>", &store);

    drag_select(&mut annotator, 0, 5);
    click_editor_button(&mut annotator, "annotator-cancel");

    let root = annotator.root();
    let doc = annotator.document();
    assert!(doc.elements_with_class(root, "annotator-hl-temporary").is_empty());
    let p = doc.first_element_with_tag(root, "p").unwrap();
    assert_eq!(doc.tree()[p].children.len(), 1);
    assert!(store.0.lock().unwrap().is_empty());
}

#[test]
fn undraw_is_idempotent() {
    let mut doc = parse("<p>Hello <em>brave</em> world</p>");
    let root = doc.body().unwrap();
    let highlighter = Highlighter::new(HighlighterConfig::default(), root);
    let mut annotation = Annotation::new(
        "note",
        vec![SerializedRange {
            start: "/p[1]".to_string(),
            end: "/p[1]".to_string(),
            start_offset: 3,
            end_offset: 15,
        }],
    );

    let spans = highlighter.draw(&mut doc, &mut annotation, None);
    assert_eq!(spans.len(), 3);
    assert_eq!(annotation.local.highlights, spans);

    highlighter.undraw(&mut doc, &mut annotation);
    highlighter.undraw(&mut doc, &mut annotation);
    assert!(doc.elements_with_class(root, "annotator-hl").is_empty());
    assert!(annotation.local.highlights.is_empty());
    assert_eq!(doc.text_content(root), "Hello brave world");

    let restored = range::deserialize(&mut doc, &annotation.ranges[0], root).unwrap();
    assert_eq!(restored.text(&doc), "lo brave wor");
}
