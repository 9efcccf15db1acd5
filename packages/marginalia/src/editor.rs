//! The annotation editor: a small form bound to one annotation at a time.

use std::fmt;

use keyboard_types::{Key, Modifiers};
use marginalia_dom::{BaseDocument, html_name};
use marginalia_traits::{DomEvent, DomEventData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::annotation::{Annotation, AnnotationRef};
use crate::chrome::{self, HIDE_CLASS, attr};
use crate::registry::ComponentError;
use crate::signal::{Position, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    /// Editing a new, unsaved annotation
    Add,
    /// Editing a stored annotation
    Edit,
}

/// How an editing session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorOutcome {
    Submitted,
    Cancelled,
    /// Submitted with an empty body; nothing is saved
    Discarded,
    /// The editor was loaded with another annotation before this session ended
    Superseded,
}

/// Resolves once the editing session started by [`Editor::load`] ends
pub type EditorSession = oneshot::Receiver<EditorOutcome>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// The editor is shown this many pixels above the requested position
    pub offset_top: f64,
    pub fields: Vec<FieldConfig>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            offset_top: 64.0,
            fields: Vec::new(),
        }
    }
}

/// An extra form field stored in [`Annotation::extra`] under `key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// `"checkbox"` or `"input"`
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
    #[serde(default)]
    pub label: String,
}

/// A field of the editor form.
///
/// `element` is the field's `<input>`.
pub trait EditorField {
    /// Populate the input from the annotation being loaded
    fn load(&mut self, doc: &mut BaseDocument, element: usize, annotation: &Annotation);
    /// Store the input's value into the annotation being submitted
    fn submit(&mut self, doc: &mut BaseDocument, element: usize, annotation: &mut Annotation);
}

/// A checkbox stored as a JSON boolean
#[derive(Debug, Clone)]
pub struct CheckboxField {
    pub key: String,
}

impl EditorField for CheckboxField {
    fn load(&mut self, doc: &mut BaseDocument, element: usize, annotation: &Annotation) {
        let checked = annotation
            .extra
            .get(&self.key)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut m = doc.mutate();
        if checked {
            m.set_attribute(element, html_name("checked"), "checked");
        } else {
            m.clear_attribute(element, html_name("checked"));
        }
    }

    fn submit(&mut self, doc: &mut BaseDocument, element: usize, annotation: &mut Annotation) {
        let checked = doc
            .get_node(element)
            .and_then(|node| node.element_data())
            .is_some_and(|el| el.has_attr("checked"));
        annotation.extra.insert(self.key.clone(), Value::Bool(checked));
    }
}

/// A single line text input stored as a JSON string
#[derive(Debug, Clone)]
pub struct InputField {
    pub key: String,
}

impl EditorField for InputField {
    fn load(&mut self, doc: &mut BaseDocument, element: usize, annotation: &Annotation) {
        let value = annotation
            .extra
            .get(&self.key)
            .and_then(Value::as_str)
            .unwrap_or("");
        doc.mutate().set_attribute(element, html_name("value"), value);
    }

    fn submit(&mut self, doc: &mut BaseDocument, element: usize, annotation: &mut Annotation) {
        let value = doc
            .get_node(element)
            .and_then(|node| node.attr("value"))
            .unwrap_or("")
            .to_string();
        annotation.extra.insert(self.key.clone(), Value::String(value));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Checkbox,
    Input,
}

impl FieldKind {
    fn from_config(kind: &str) -> Result<Self, ComponentError> {
        match kind {
            "checkbox" => Ok(Self::Checkbox),
            "input" => Ok(Self::Input),
            other => Err(ComponentError::UnsupportedField(other.to_string())),
        }
    }
}

/// The editor's body input
pub trait RichTextWidget {
    fn set(&mut self, doc: &mut BaseDocument, textarea: usize, text: &str);
    fn get(&self, doc: &BaseDocument, textarea: usize) -> String;
    /// Focus the input with the caret after the existing text
    fn focus_end(&mut self, doc: &mut BaseDocument, textarea: usize);
}

/// A plain `<textarea>` whose value is its text content
#[derive(Debug, Default)]
pub struct TextareaWidget;

impl RichTextWidget for TextareaWidget {
    fn set(&mut self, doc: &mut BaseDocument, textarea: usize, text: &str) {
        doc.mutate().set_text_content(textarea, text);
    }

    fn get(&self, doc: &BaseDocument, textarea: usize) -> String {
        doc.text_content(textarea)
    }

    fn focus_end(&mut self, doc: &mut BaseDocument, textarea: usize) {
        doc.set_focus_to(textarea);
    }
}

enum EditorState {
    Closed,
    Open {
        mode: EditorMode,
        annotation: AnnotationRef,
        completion: oneshot::Sender<EditorOutcome>,
    },
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open { mode, .. } => write!(f, "Open({mode:?})"),
        }
    }
}

struct FieldSlot {
    input: usize,
    field: Box<dyn EditorField>,
}

pub struct Editor {
    config: EditorConfig,
    element: usize,
    listing: usize,
    textarea: usize,
    add_button: usize,
    edit_button: usize,
    fields: Vec<FieldSlot>,
    widget: Box<dyn RichTextWidget>,
    state: EditorState,
}

impl Editor {
    /// Build the editor's form (hidden) inside `container`.
    pub fn new(
        doc: &mut BaseDocument,
        config: EditorConfig,
        container: usize,
        widget: Option<Box<dyn RichTextWidget>>,
    ) -> Self {
        let mut m = doc.mutate();
        let element = chrome::create_element(&mut m, "div", "annotator-outer annotator-editor annotator-hide");
        let form = chrome::create_element(&mut m, "form", "annotator-widget");
        let listing = chrome::create_element(&mut m, "ul", "annotator-listing");
        let textarea = chrome::create_element(&mut m, "textarea", "");
        let controls = chrome::create_element(&mut m, "div", "annotator-controls");
        m.append_children(container, &[element]);
        m.append_children(element, &[form]);
        m.append_children(form, &[listing, textarea, controls]);
        chrome::append_element_with_text(&mut m, controls, "a", "annotator-cancel", "Cancel");
        let add_button = chrome::append_element_with_text(&mut m, controls, "a", "annotator-add", "Save");
        let edit_button = chrome::append_element_with_text(&mut m, controls, "a", "annotator-edit", "Update");
        drop(m);

        let fields = config.fields.clone();
        let mut editor = Self {
            config,
            element,
            listing,
            textarea,
            add_button,
            edit_button,
            fields: Vec::new(),
            widget: widget.unwrap_or_else(|| Box::new(TextareaWidget)),
            state: EditorState::Closed,
        };

        for field in fields {
            if let Err(err) = editor.add_configured_field(doc, &field) {
                tracing::warn!(key = %field.key, %err, "skipping editor field");
            }
        }

        editor
    }

    fn add_configured_field(
        &mut self,
        doc: &mut BaseDocument,
        config: &FieldConfig,
    ) -> Result<usize, ComponentError> {
        let kind = FieldKind::from_config(&config.kind)?;
        let field: Box<dyn EditorField> = match kind {
            FieldKind::Checkbox => Box::new(CheckboxField {
                key: config.key.clone(),
            }),
            FieldKind::Input => Box::new(InputField {
                key: config.key.clone(),
            }),
        };
        Ok(self.add_field(doc, kind, &config.label, field))
    }

    /// Add a field to the form. Returns the id of its `<input>`.
    pub fn add_field(
        &mut self,
        doc: &mut BaseDocument,
        kind: FieldKind,
        label: &str,
        field: Box<dyn EditorField>,
    ) -> usize {
        let input_id = format!("annotator-field-{}", self.fields.len());
        let mut m = doc.mutate();
        let item = match kind {
            FieldKind::Checkbox => chrome::create_element(&mut m, "li", "annotator-item annotator-checkbox"),
            FieldKind::Input => chrome::create_element(&mut m, "li", "annotator-item"),
        };
        let mut attrs = vec![attr("id", &input_id), attr("placeholder", label)];
        if kind == FieldKind::Checkbox {
            attrs.push(attr("type", "checkbox"));
        }
        let input = m.create_element(html_name("input"), attrs);
        m.append_children(self.listing, &[item]);
        m.append_children(item, &[input]);
        if kind == FieldKind::Checkbox {
            let label_el = chrome::append_element_with_text(&mut m, item, "label", "", label);
            m.set_attribute(label_el, html_name("for"), &input_id);
        }
        drop(m);

        self.fields.push(FieldSlot { input, field });
        input
    }

    pub fn element(&self) -> usize {
        self.element
    }

    pub fn textarea(&self) -> usize {
        self.textarea
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, EditorState::Open { .. })
    }

    pub fn mode(&self) -> Option<EditorMode> {
        match &self.state {
            EditorState::Open { mode, .. } => Some(*mode),
            EditorState::Closed => None,
        }
    }

    pub fn annotation(&self) -> Option<&AnnotationRef> {
        match &self.state {
            EditorState::Open { annotation, .. } => Some(annotation),
            EditorState::Closed => None,
        }
    }

    /// Replace the body text of the open editor
    pub fn set_text(&mut self, doc: &mut BaseDocument, text: &str) {
        self.widget.set(doc, self.textarea, text);
    }

    /// Open the editor on `annotation`.
    ///
    /// A session that is still open is resolved as [`EditorOutcome::Superseded`].
    pub fn load(
        &mut self,
        doc: &mut BaseDocument,
        annotation: AnnotationRef,
        position: Position,
        mode: EditorMode,
    ) -> (EditorSession, Vec<Signal>) {
        if let EditorState::Open { completion, .. } = std::mem::replace(&mut self.state, EditorState::Closed) {
            tracing::debug!("editor reloaded while open");
            let _ = completion.send(EditorOutcome::Superseded);
        }

        let (shown, hidden) = match mode {
            EditorMode::Add => (self.add_button, self.edit_button),
            EditorMode::Edit => (self.edit_button, self.add_button),
        };
        let mut m = doc.mutate();
        m.remove_class(shown, HIDE_CLASS);
        m.add_class(hidden, HIDE_CLASS);
        drop(m);

        {
            let current = annotation.borrow();
            self.widget.set(doc, self.textarea, &current.text);
            for slot in &mut self.fields {
                slot.field.load(doc, slot.input, &current);
            }
        }

        let (completion, session) = oneshot::channel();
        self.state = EditorState::Open {
            mode,
            annotation,
            completion,
        };
        let opened = self.show(doc, position);
        (session, vec![opened])
    }

    /// Store the form into the annotation and close the editor
    pub fn submit(&mut self, doc: &mut BaseDocument) -> Vec<Signal> {
        let EditorState::Open {
            mode,
            annotation,
            completion,
        } = std::mem::replace(&mut self.state, EditorState::Closed)
        else {
            return Vec::new();
        };

        let body = self.widget.get(doc, self.textarea).trim().to_string();
        if body.is_empty() {
            tracing::debug!("discarding annotation with an empty body");
            let _ = completion.send(EditorOutcome::Discarded);
            return vec![self.hide(doc)];
        }

        {
            let mut current = annotation.borrow_mut();
            for slot in &mut self.fields {
                slot.field.submit(doc, slot.input, &mut current);
            }
            current.text = body;
        }
        let _ = completion.send(EditorOutcome::Submitted);
        let saved = match mode {
            EditorMode::Add => Signal::SaveNewAnnotation(annotation),
            EditorMode::Edit => Signal::UpdateAnnotation(annotation),
        };
        vec![saved, self.hide(doc)]
    }

    pub fn cancel(&mut self, doc: &mut BaseDocument) -> Vec<Signal> {
        let EditorState::Open { completion, .. } = std::mem::replace(&mut self.state, EditorState::Closed)
        else {
            return Vec::new();
        };
        let _ = completion.send(EditorOutcome::Cancelled);
        vec![self.hide(doc)]
    }

    /// React to clicks on the form controls and keys pressed in the textarea
    pub fn handle_event(&mut self, doc: &mut BaseDocument, event: &DomEvent) -> Vec<Signal> {
        if !event.composed_path().contains(&self.element) {
            return Vec::new();
        }

        match &event.data {
            DomEventData::Click(_) => {
                let path = event.composed_path();
                if chrome::find_in_path(doc, path, "annotator-cancel").is_some() {
                    self.cancel(doc)
                } else if chrome::find_in_path(doc, path, "annotator-add").is_some()
                    || chrome::find_in_path(doc, path, "annotator-edit").is_some()
                {
                    self.submit(doc)
                } else {
                    Vec::new()
                }
            }
            DomEventData::KeyDown(key) if event.target == self.textarea => match key.key {
                Key::Escape => self.cancel(doc),
                Key::Enter if !key.modifiers.contains(Modifiers::SHIFT) => self.submit(doc),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Remove the form from the page. An open session resolves as cancelled.
    pub fn destroy(&mut self, doc: &mut BaseDocument) {
        if let EditorState::Open { completion, .. } = std::mem::replace(&mut self.state, EditorState::Closed) {
            let _ = completion.send(EditorOutcome::Cancelled);
        }
        if doc.get_focussed_node_id() == Some(self.textarea) {
            doc.clear_focus();
        }
        doc.mutate().remove_and_drop_node(self.element);
    }

    fn show(&mut self, doc: &mut BaseDocument, position: Position) -> Signal {
        let mut m = doc.mutate();
        m.remove_class(self.element, HIDE_CLASS);
        chrome::place_at(&mut m, self.element, position.top - self.config.offset_top, None);
        drop(m);
        self.widget.focus_end(doc, self.textarea);
        Signal::EditorOpened
    }

    fn hide(&mut self, doc: &mut BaseDocument) -> Signal {
        doc.mutate().add_class(self.element, HIDE_CLASS);
        if doc.get_focussed_node_id() == Some(self.textarea) {
            doc.clear_focus();
        }
        Signal::EditorClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::parse;
    use keyboard_types::Code;
    use marginalia_traits::{KeyEvent, MouseButtonEvent};
    use serde_json::json;

    fn editor(doc: &mut BaseDocument, fields: Vec<FieldConfig>) -> Editor {
        let body = doc.body().unwrap();
        Editor::new(
            doc,
            EditorConfig {
                fields,
                ..Default::default()
            },
            body,
            None,
        )
    }

    fn names(signals: &[Signal]) -> Vec<&'static str> {
        signals.iter().map(Signal::name).collect()
    }

    #[test]
    fn load_shows_the_form_in_add_mode() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());
        let annotation = Annotation::new("draft", Vec::new()).into_ref();

        let (_session, signals) = editor.load(&mut doc, annotation, Position::new(100.0, 0.0), EditorMode::Add);
        assert_eq!(names(&signals), ["editor-opened"]);
        assert!(!doc.tree()[editor.element()].has_class(HIDE_CLASS));
        assert_eq!(doc.tree()[editor.element()].attr("style"), Some("top: 36px"));
        assert_eq!(doc.text_content(editor.textarea()), "draft");
        assert_eq!(doc.get_focussed_node_id(), Some(editor.textarea()));
        assert!(doc.elements_with_class(editor.element(), "annotator-edit").iter().all(|id| doc.tree()[*id].has_class(HIDE_CLASS)));
    }

    #[test]
    fn submit_saves_non_empty_body() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());
        let annotation = Annotation::default().into_ref();

        let (mut session, _) = editor.load(&mut doc, annotation.clone(), Position::default(), EditorMode::Add);
        editor.set_text(&mut doc, "  greeting \n");
        let signals = editor.submit(&mut doc);

        assert_eq!(names(&signals), ["save-new-annotation", "editor-closed"]);
        assert_eq!(annotation.borrow().text, "greeting");
        assert_eq!(session.try_recv(), Ok(EditorOutcome::Submitted));
        assert!(!editor.is_open());
        assert!(doc.tree()[editor.element()].has_class(HIDE_CLASS));
    }

    #[test]
    fn empty_body_is_discarded() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());
        let annotation = Annotation::default().into_ref();

        let (mut session, _) = editor.load(&mut doc, annotation, Position::default(), EditorMode::Add);
        editor.set_text(&mut doc, "   ");
        let signals = editor.submit(&mut doc);

        assert_eq!(names(&signals), ["editor-closed"]);
        assert_eq!(session.try_recv(), Ok(EditorOutcome::Discarded));
    }

    #[test]
    fn discarded_submit_leaves_fields_unapplied() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(
            &mut doc,
            vec![FieldConfig { kind: "input".into(), key: "tags".into(), label: "Tags".into() }],
        );
        let annotation = Annotation::default().into_ref();

        editor.load(&mut doc, annotation.clone(), Position::default(), EditorMode::Add);
        let input = doc.get_element_by_id("annotator-field-0").unwrap();
        doc.mutate().set_attribute(input, html_name("value"), "poetry");
        editor.set_text(&mut doc, " ");

        assert_eq!(names(&editor.submit(&mut doc)), ["editor-closed"]);
        assert!(annotation.borrow().extra.is_empty());
    }

    #[test]
    fn edit_mode_emits_update() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());
        let annotation = Annotation::new("old", Vec::new()).into_ref();

        editor.load(&mut doc, annotation, Position::default(), EditorMode::Edit);
        assert_eq!(editor.mode(), Some(EditorMode::Edit));
        assert_eq!(names(&editor.submit(&mut doc)), ["update-annotation", "editor-closed"]);
    }

    #[test]
    fn reloading_supersedes_the_open_session() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());

        let (mut first, _) = editor.load(&mut doc, Annotation::default().into_ref(), Position::default(), EditorMode::Add);
        let (mut second, _) = editor.load(&mut doc, Annotation::default().into_ref(), Position::default(), EditorMode::Add);

        assert_eq!(first.try_recv(), Ok(EditorOutcome::Superseded));
        assert!(second.try_recv().is_err());
        editor.cancel(&mut doc);
        assert_eq!(second.try_recv(), Ok(EditorOutcome::Cancelled));
    }

    #[test]
    fn keys_in_the_textarea() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());
        let textarea = editor.textarea();
        let key_event = |doc: &BaseDocument, key: KeyEvent| {
            DomEvent::new(textarea, DomEventData::KeyDown(key), doc.node_chain(textarea))
        };

        editor.load(&mut doc, Annotation::default().into_ref(), Position::default(), EditorMode::Add);
        editor.set_text(&mut doc, "note");
        let shift_enter = key_event(
            &doc,
            KeyEvent::pressed(Key::Enter, Code::Enter).with_modifiers(Modifiers::SHIFT),
        );
        assert!(editor.handle_event(&mut doc, &shift_enter).is_empty());
        assert!(editor.is_open());

        let enter = key_event(&doc, KeyEvent::pressed(Key::Enter, Code::Enter));
        let signals = editor.handle_event(&mut doc, &enter);
        assert_eq!(names(&signals), ["save-new-annotation", "editor-closed"]);

        editor.load(&mut doc, Annotation::default().into_ref(), Position::default(), EditorMode::Add);
        let escape = key_event(&doc, KeyEvent::pressed(Key::Escape, Code::Escape));
        let signals = editor.handle_event(&mut doc, &escape);
        assert_eq!(names(&signals), ["editor-closed"]);
    }

    #[test]
    fn cancel_button_click() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(&mut doc, Vec::new());
        let cancel = doc.elements_with_class(editor.element(), "annotator-cancel")[0];

        let (mut session, _) = editor.load(&mut doc, Annotation::default().into_ref(), Position::default(), EditorMode::Add);
        let click = DomEvent::new(cancel, DomEventData::Click(MouseButtonEvent::new(0.0, 0.0)), doc.node_chain(cancel));
        assert_eq!(names(&editor.handle_event(&mut doc, &click)), ["editor-closed"]);
        assert_eq!(session.try_recv(), Ok(EditorOutcome::Cancelled));
    }

    #[test]
    fn configured_fields_round_trip_extra_values() {
        let mut doc = parse("<p>Hello</p>");
        let mut editor = editor(
            &mut doc,
            vec![
                FieldConfig { kind: "checkbox".into(), key: "private".into(), label: "Private".into() },
                FieldConfig { kind: "select".into(), key: "color".into(), label: String::new() },
                FieldConfig { kind: "input".into(), key: "tags".into(), label: "Tags".into() },
            ],
        );
        assert_eq!(doc.elements_with_class(editor.element(), "annotator-item").len(), 2);

        let mut annotation = Annotation::default();
        annotation.extra.insert("private".into(), json!(true));
        annotation.extra.insert("tags".into(), json!("poetry"));
        let annotation = annotation.into_ref();

        editor.load(&mut doc, annotation.clone(), Position::default(), EditorMode::Edit);
        let checkbox = doc.get_element_by_id("annotator-field-0").unwrap();
        let input = doc.get_element_by_id("annotator-field-1").unwrap();
        assert!(doc.tree()[checkbox].element_data().unwrap().has_attr("checked"));
        assert_eq!(doc.tree()[input].attr("value"), Some("poetry"));

        let mut m = doc.mutate();
        m.clear_attribute(checkbox, html_name("checked"));
        m.set_attribute(input, html_name("value"), "prose");
        drop(m);
        editor.set_text(&mut doc, "body");
        editor.submit(&mut doc);

        let current = annotation.borrow();
        assert_eq!(current.extra.get("private"), Some(&json!(false)));
        assert_eq!(current.extra.get("tags"), Some(&json!("prose")));
    }
}
