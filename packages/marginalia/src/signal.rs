//! The signals exchanged between annotation components.

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationRef;
use crate::range::NormalizedRange;
use crate::text_selector::PointerInfo;

/// A page position in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

impl Position {
    pub fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}

/// A notification dispatched on the annotator's bus.
///
/// Each variant has a stable wire name (see [`Signal::name`]) so that hosts observing the
/// bus can match on strings.
#[derive(Debug, Clone)]
pub enum Signal {
    TextSelected {
        ranges: Vec<NormalizedRange>,
        pointer: PointerInfo,
    },
    TextDeselected {
        pointer: PointerInfo,
    },
    NewAnnotation {
        annotation: AnnotationRef,
        position: Position,
    },
    SaveNewAnnotation(AnnotationRef),
    UpdateAnnotation(AnnotationRef),
    AnnotationCreated(AnnotationRef),
    AnnotationUpdated(AnnotationRef),
    AnnotationDeleted {
        annotation: AnnotationRef,
        /// Message returned by storage, shown to the user
        message: Option<String>,
    },
    EditAnnotation {
        annotation: AnnotationRef,
        position: Position,
    },
    DeleteAnnotation(AnnotationRef),
    AnnotationsRetrieved(Vec<AnnotationRef>),
    AnnotationSelected(AnnotationRef),
    EditorOpened,
    EditorClosed,
    ViewerOpened,
    ViewerClosed,
    DocumentElementChanged {
        root: usize,
        document_id: Option<String>,
    },
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::TextSelected { .. } => "text-selected",
            Signal::TextDeselected { .. } => "text-deselected",
            Signal::NewAnnotation { .. } => "new-annotation",
            Signal::SaveNewAnnotation(_) => "save-new-annotation",
            Signal::UpdateAnnotation(_) => "update-annotation",
            Signal::AnnotationCreated(_) => "annotation-created",
            Signal::AnnotationUpdated(_) => "annotation-updated",
            Signal::AnnotationDeleted { .. } => "annotation-deleted",
            Signal::EditAnnotation { .. } => "edit-annotation",
            Signal::DeleteAnnotation(_) => "delete-annotation",
            Signal::AnnotationsRetrieved(_) => "annotations-retrieved",
            Signal::AnnotationSelected(_) => "annotation-selected",
            Signal::EditorOpened => "editor-opened",
            Signal::EditorClosed => "editor-closed",
            Signal::ViewerOpened => "viewer-opened",
            Signal::ViewerClosed => "viewer-closed",
            Signal::DocumentElementChanged { .. } => "document-element-changed",
        }
    }

    /// The annotation this signal is about, if it is about exactly one
    pub fn annotation(&self) -> Option<&AnnotationRef> {
        match self {
            Signal::NewAnnotation { annotation, .. }
            | Signal::SaveNewAnnotation(annotation)
            | Signal::UpdateAnnotation(annotation)
            | Signal::AnnotationCreated(annotation)
            | Signal::AnnotationUpdated(annotation)
            | Signal::AnnotationDeleted { annotation, .. }
            | Signal::EditAnnotation { annotation, .. }
            | Signal::DeleteAnnotation(annotation)
            | Signal::AnnotationSelected(annotation) => Some(annotation),
            _ => None,
        }
    }
}
