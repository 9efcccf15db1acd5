//! The lifecycle coordinator.
//!
//! An [`Annotator`] owns a document and the components annotating it. Input events are
//! routed to the components, which answer with [`Signal`]s. Signals are dispatched
//! depth-first: the follow-up signals a component produces are fully handled before the
//! next component sees the original signal. The order in which components react to each
//! signal is fixed in [`Annotator::react`].

use std::sync::mpsc::{Receiver, Sender, channel};
use std::task::Poll;

use marginalia_dom::BaseDocument;
use marginalia_traits::{DomEvent, DomEventData, UiEvent};
use rustc_hash::FxHashMap;

use crate::annotation::{Annotation, AnnotationRef};
use crate::block_counters::BlockCount;
use crate::config::{AnnotatorConfig, ConfigError};
use crate::editor::{EditorMode, EditorSession};
use crate::highlighter::DrawAll;
use crate::range::NormalizedRange;
use crate::registry::{BuildContext, Components};
use crate::signal::{Position, Signal};
use crate::store::{
    AnnotationStore, AuthorizationPolicy, Collaborators, IdentityPolicy, StoreAction, StoreCallback,
    StoreResult,
};
use crate::text_selector::PointerInfo;

/// Results delivered to the annotator from other threads
pub(crate) enum Message {
    Counts(Vec<BlockCount>),
    BlockAnnotations {
        block_id: String,
        annotations: Vec<Annotation>,
    },
    Store {
        request: u64,
        result: StoreResult,
    },
}

type Observer = Box<dyn FnMut(&Signal)>;

pub struct Annotator {
    doc: BaseDocument,
    config: AnnotatorConfig,
    root: usize,
    document_id: Option<String>,
    components: Components,

    store: Box<dyn AnnotationStore>,
    authorization: Box<dyn AuthorizationPolicy>,
    identity: Box<dyn IdentityPolicy>,

    sender: Sender<Message>,
    receiver: Receiver<Message>,
    pending_store: FxHashMap<u64, (StoreAction, AnnotationRef)>,
    next_request: u64,

    draw_task: Option<DrawAll>,
    editor_session: Option<EditorSession>,
    observers: Vec<Observer>,
}

impl Annotator {
    /// Build the configured components over `doc`.
    ///
    /// Unknown component names and unusable document-level settings are errors. A
    /// component that fails to build is logged and left out.
    pub fn new(
        mut doc: BaseDocument,
        config: AnnotatorConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        let kinds = config.component_kinds()?;

        if let Some(url) = &config.base_url {
            doc.set_base_url(url).map_err(|source| ConfigError::InvalidUrl {
                url: url.clone(),
                source,
            })?;
        }

        let root = match &config.document_element {
            Some(id) => doc
                .get_element_by_id(id)
                .ok_or_else(|| ConfigError::MissingDocumentElement(id.clone()))?,
            None => doc
                .body()
                .ok_or_else(|| ConfigError::MissingDocumentElement("body".to_string()))?,
        };
        let chrome_parent = doc.body().unwrap_or(root);

        let Collaborators {
            store,
            authorization,
            identity,
            rich_text,
        } = collaborators;
        let (sender, receiver) = channel();

        let mut components = Components::default();
        let mut cx = BuildContext {
            doc: &mut doc,
            config: &config,
            root,
            chrome_parent,
            sender: &sender,
            rich_text,
        };
        for kind in &kinds {
            match kind.build(&mut cx) {
                Ok(component) => components.insert(component),
                Err(err) => tracing::error!(component = %kind, %err, "failed to initialize component"),
            }
        }
        drop(cx);

        tracing::debug!(components = ?components.kinds(), root, "annotator ready");

        let mut annotator = Self {
            doc,
            document_id: config.document_id.clone(),
            config,
            root,
            components,
            store,
            authorization,
            identity,
            sender,
            receiver,
            pending_store: FxHashMap::default(),
            next_request: 0,
            draw_task: None,
            editor_session: None,
            observers: Vec::new(),
        };
        if let Some(counters) = &mut annotator.components.block_counters {
            counters.refresh(&mut annotator.doc);
        }
        Ok(annotator)
    }

    pub fn document(&self) -> &BaseDocument {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut BaseDocument {
        &mut self.doc
    }

    /// The element whose text is annotated
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Observe every dispatched signal
    pub fn on_signal(&mut self, observer: impl FnMut(&Signal) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// The session of the most recently opened editor, if not taken yet
    pub fn take_editor_session(&mut self) -> Option<EditorSession> {
        self.editor_session.take()
    }

    /// Replace the body text of the editor
    pub fn set_editor_text(&mut self, text: &str) {
        if let Some(editor) = &mut self.components.editor {
            editor.set_text(&mut self.doc, text);
        }
    }

    /// Hit test a window event and handle the DOM events it causes
    pub fn handle_ui_event(&mut self, event: UiEvent) {
        for event in self.doc.ui_to_dom_events(event) {
            self.handle_dom_event(event);
        }
    }

    pub fn handle_dom_event(&mut self, event: DomEvent) {
        let doc = &mut self.doc;
        let mut signals = Vec::new();
        match &event.data {
            DomEventData::MouseDown(_) | DomEventData::MouseUp(_) => {
                if let Some(selector) = &mut self.components.text_selector {
                    signals.extend(selector.handle_event(doc, &event).map(Signal::from));
                }
            }
            DomEventData::Click(_) => {
                if let Some(editor) = &mut self.components.editor {
                    signals.extend(editor.handle_event(doc, &event));
                }
                if let Some(viewer) = &mut self.components.viewer {
                    signals.extend(viewer.handle_event(doc, &event));
                }
                if let Some(counters) = &mut self.components.block_counters {
                    counters.handle_event(doc, &event);
                }
                if let Some(selector) = &mut self.components.line_numbers {
                    signals.extend(selector.handle_event(doc, &event).map(Signal::from));
                }
            }
            DomEventData::KeyDown(_) => {
                if let Some(editor) = &mut self.components.editor {
                    signals.extend(editor.handle_event(doc, &event));
                }
            }
            DomEventData::Event("resize") => {
                if let Some(counters) = &mut self.components.block_counters {
                    counters.refresh(doc);
                }
            }
            _ => {}
        }

        for signal in signals {
            self.emit(signal);
        }
    }

    /// Dispatch a signal, and everything it causes, to the components
    pub fn emit(&mut self, signal: Signal) {
        self.dispatch(signal);
        self.doc.shell_provider.request_redraw();
    }

    fn dispatch(&mut self, signal: Signal) {
        tracing::trace!(signal = signal.name(), "dispatch");
        for observer in &mut self.observers {
            observer(&signal);
        }
        self.react(signal);
    }

    fn dispatch_all(&mut self, signals: Vec<Signal>) {
        for signal in signals {
            self.dispatch(signal);
        }
    }

    fn react(&mut self, signal: Signal) {
        let doc = &mut self.doc;
        match signal {
            Signal::TextSelected { ranges, pointer } => {
                // Serialize before anything mutates the DOM under the ranges
                let draft = self.make_annotation(&ranges);
                if let Some(highlighter) = &mut self.components.highlighter {
                    highlighter.undraw_all(&mut self.doc);
                }
                if let Some(annotation) = draft {
                    let position = selection_position(&pointer);
                    self.dispatch(Signal::NewAnnotation {
                        annotation,
                        position,
                    });
                }
                self.doc.selection_mut().remove_all_ranges();
            }
            Signal::TextDeselected { .. } => {
                if let Some(editor) = &mut self.components.editor {
                    let signals = editor.cancel(doc);
                    self.dispatch_all(signals);
                }
                if let Some(viewer) = &mut self.components.viewer {
                    viewer.dehighlight_all(&mut self.doc);
                }
                if let Some(highlighter) = &mut self.components.highlighter {
                    highlighter.undraw_all(&mut self.doc);
                }
            }
            Signal::NewAnnotation {
                annotation,
                position,
            } => {
                // The editor opening closes the viewer, which clears temporary highlights;
                // the new one is drawn after that
                self.open_editor(annotation.clone(), position, EditorMode::Add);
                if let Some(highlighter) = &mut self.components.highlighter {
                    highlighter.draw_temporary(&mut self.doc, &annotation);
                }
            }
            Signal::SaveNewAnnotation(annotation) => self.request(StoreAction::Create, annotation),
            Signal::UpdateAnnotation(annotation) => self.request(StoreAction::Update, annotation),
            Signal::DeleteAnnotation(annotation) => self.request(StoreAction::Delete, annotation),
            Signal::AnnotationCreated(annotation) => {
                if let Some(highlighter) = &self.components.highlighter {
                    highlighter.undraw(doc, &mut annotation.borrow_mut());
                }
                self.refresh_counts();
            }
            Signal::AnnotationUpdated(_) => self.refresh_counts(),
            Signal::AnnotationDeleted { .. } => {
                if let Some(viewer) = &mut self.components.viewer {
                    let signals = viewer.close(doc);
                    self.dispatch_all(signals);
                }
                self.refresh_counts();
            }
            Signal::EditAnnotation {
                annotation,
                position,
            } => self.open_editor(annotation, position, EditorMode::Edit),
            Signal::AnnotationsRetrieved(annotations) => {
                if let Some(viewer) = &mut self.components.viewer {
                    let user = self.identity.who();
                    let signals = viewer.load_annotations(
                        doc,
                        annotations,
                        false,
                        self.authorization.as_ref(),
                        user.as_deref(),
                    );
                    self.dispatch_all(signals);
                }
            }
            Signal::AnnotationSelected(annotation) => {
                if let Some(highlighter) = &mut self.components.highlighter {
                    highlighter.draw_selected(doc, &annotation);
                }
            }
            Signal::EditorOpened => {
                if let Some(viewer) = &mut self.components.viewer {
                    let signals = viewer.close(doc);
                    self.dispatch_all(signals);
                }
            }
            Signal::EditorClosed | Signal::ViewerClosed => {
                if let Some(highlighter) = &mut self.components.highlighter {
                    highlighter.undraw_all(doc);
                }
            }
            Signal::ViewerOpened => {
                if let Some(editor) = self.components.editor.as_mut().filter(|editor| editor.is_open()) {
                    let signals = editor.cancel(doc);
                    self.dispatch_all(signals);
                }
            }
            Signal::DocumentElementChanged { root, document_id } => {
                self.root = root;
                self.document_id = document_id;
                self.components.set_root(root);
                self.refresh_counts();
            }
        }
    }

    fn open_editor(&mut self, annotation: AnnotationRef, position: Position, mode: EditorMode) {
        let Some(editor) = &mut self.components.editor else {
            return;
        };
        let (session, signals) = editor.load(&mut self.doc, annotation, position, mode);
        self.editor_session = Some(session);
        self.dispatch_all(signals);
    }

    fn refresh_counts(&mut self) {
        if let Some(counters) = &mut self.components.block_counters {
            counters.refresh(&mut self.doc);
        }
    }

    /// Build an unsaved annotation from normalized ranges. Ranges that can't be
    /// serialized are left out; `None` when none remain.
    pub fn make_annotation(&self, ranges: &[NormalizedRange]) -> Option<AnnotationRef> {
        let highlighter = &self.config.highlighter;
        let ignore = [
            highlighter.highlight_class.as_str(),
            highlighter.temp_highlight_class.as_str(),
        ];

        let mut quote = Vec::with_capacity(ranges.len());
        let mut serialized = Vec::with_capacity(ranges.len());
        for range in ranges {
            match range.serialize(&self.doc, self.root, &ignore) {
                Ok(spec) => {
                    quote.push(range.text(&self.doc).trim().to_string());
                    serialized.push(spec);
                }
                Err(err) => tracing::debug!(%err, "dropping range from draft"),
            }
        }
        if serialized.is_empty() {
            return None;
        }

        Some(
            Annotation {
                quote: quote.join(" / "),
                ranges: serialized,
                ..Default::default()
            }
            .into_ref(),
        )
    }

    fn request(&mut self, action: StoreAction, annotation: AnnotationRef) {
        let payload = annotation.borrow().payload();
        if action == StoreAction::Create && !payload.is_persistable() {
            tracing::debug!("not saving an annotation without ranges");
            return;
        }

        let request = self.next_request;
        self.next_request += 1;
        self.pending_store.insert(request, (action, annotation));

        let sender = self.sender.clone();
        let done: StoreCallback = Box::new(move |result| {
            let _ = sender.send(Message::Store { request, result });
        });
        match action {
            StoreAction::Create => self.store.create(payload, done),
            StoreAction::Update => self.store.update(payload, done),
            StoreAction::Delete => self.store.delete(payload, done),
        }
    }

    /// Apply completed network and storage requests and advance batch drawing.
    ///
    /// Returns whether anything happened.
    pub fn poll(&mut self) -> bool {
        let mut progressed = false;
        while let Ok(message) = self.receiver.try_recv() {
            progressed = true;
            self.apply(message);
        }

        let finished = match (&mut self.draw_task, &self.components.highlighter) {
            (Some(task), Some(highlighter)) => {
                progressed = true;
                match task.step(&mut self.doc, highlighter) {
                    Poll::Ready(spans) => {
                        tracing::debug!(spans = spans.len(), "finished drawing annotations");
                        true
                    }
                    Poll::Pending => false,
                }
            }
            (Some(_), None) => true,
            _ => false,
        };
        if finished {
            self.draw_task = None;
        }

        if progressed {
            self.doc.shell_provider.request_redraw();
        }
        progressed
    }

    /// Whether a batch draw is still in progress
    pub fn is_drawing(&self) -> bool {
        self.draw_task.is_some()
    }

    fn apply(&mut self, message: Message) {
        match message {
            Message::Counts(counts) => {
                if let Some(counters) = &mut self.components.block_counters {
                    counters.apply_counts(&mut self.doc, counts);
                }
            }
            Message::BlockAnnotations {
                block_id,
                annotations,
            } => {
                tracing::debug!(block = %block_id, count = annotations.len(), "retrieved annotations");
                let annotations = annotations.into_iter().map(Annotation::into_ref).collect();
                self.emit(Signal::AnnotationsRetrieved(annotations));
            }
            Message::Store { request, result } => {
                let Some((action, annotation)) = self.pending_store.remove(&request) else {
                    return;
                };
                match result {
                    Ok(response) => match action {
                        StoreAction::Create => {
                            if let Some(id) = response.annotation.and_then(|stored| stored.id) {
                                annotation.borrow_mut().id = Some(id);
                            }
                            self.emit(Signal::AnnotationCreated(annotation));
                        }
                        StoreAction::Update => self.emit(Signal::AnnotationUpdated(annotation)),
                        StoreAction::Delete => {
                            if let Some(message) = &response.message {
                                self.doc.shell_provider.alert(message);
                            }
                            self.emit(Signal::AnnotationDeleted {
                                annotation,
                                message: response.message,
                            });
                        }
                    },
                    Err(err) => {
                        tracing::error!(?action, %err, "storage request failed");
                        self.doc.shell_provider.alert(&err.to_string());
                    }
                }
            }
        }
    }

    /// Draw stored annotations a chunk at a time; [`Annotator::poll`] draws the rest
    pub fn draw_all(&mut self, annotations: Vec<AnnotationRef>) {
        let Some(highlighter) = &self.components.highlighter else {
            return;
        };
        let mut task = highlighter.draw_all(annotations);
        if task.step(&mut self.doc, highlighter).is_pending() {
            self.draw_task = Some(task);
        }
    }

    /// Annotate a different element, e.g. after the host replaced the page content
    pub fn set_document_element(&mut self, root: usize, document_id: Option<String>) {
        self.emit(Signal::DocumentElementChanged { root, document_id });
    }

    /// Remove every highlight and all annotator UI from the document
    pub fn destroy(&mut self) {
        let mut components = std::mem::take(&mut self.components);
        if let Some(highlighter) = &mut components.highlighter {
            highlighter.destroy(&mut self.doc);
        }
        if let Some(editor) = &mut components.editor {
            editor.destroy(&mut self.doc);
        }
        if let Some(viewer) = &mut components.viewer {
            viewer.destroy(&mut self.doc);
        }
        if let Some(counters) = &mut components.block_counters {
            counters.clear(&mut self.doc);
        }
        self.draw_task = None;
        self.pending_store.clear();
        self.doc.selection_mut().remove_all_ranges();
        tracing::debug!("annotator destroyed");
    }
}

/// New annotations open next to whichever end of the selection is higher on the page
fn selection_position(pointer: &PointerInfo) -> Position {
    let up = &pointer.event;
    match &pointer.start_of_selection {
        Some(down) if down.y < up.y => Position::new(f64::from(down.y), f64::from(down.x)),
        _ => Position::new(f64::from(up.y), f64::from(up.x)),
    }
}
