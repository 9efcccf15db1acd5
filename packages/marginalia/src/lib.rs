//! Text annotation on top of a headless DOM.
//!
//! An [`Annotator`] wraps a [`BaseDocument`](marginalia_dom::BaseDocument) and lets the
//! user select text, write a note about it and browse the notes other people left. It is
//! made of independent components that talk to each other only through [`Signal`]s:
//!
//! - [`TextSelector`] and [`LineNumberSelector`] turn pointer gestures into normalized ranges
//! - [`Highlighter`] wraps annotated text in highlight spans
//! - [`Editor`] is the form used to write or change a note
//! - [`Viewer`] lists the annotations of a block
//! - [`BlockCounters`] shows how many annotations each block has
//!
//! Ranges are stored as [`SerializedRange`]s, whose positions are `nth-of-type` paths
//! relative to the annotated element (see [`position`]). Persistence, authorization and
//! identity are supplied by the host through [`Collaborators`].

mod annotation;
mod annotator;
mod block_counters;
mod chrome;
mod config;
mod editor;
mod highlighter;
mod line_number_selector;
pub mod position;
pub mod range;
mod registry;
mod signal;
mod store;
mod text_selector;
mod viewer;

#[cfg(test)]
mod testing;

pub use annotation::{Annotation, AnnotationId, AnnotationRef, LocalState, SerializedRange, decode_records};
pub use annotator::Annotator;
pub use block_counters::{BlockCount, BlockCounterConfig, BlockCounters};
pub use chrome::{CHROME_CLASS_PREFIX, HIDE_CLASS, is_chrome};
pub use config::{AnnotatorConfig, ConfigError};
pub use editor::{
    CheckboxField, Editor, EditorConfig, EditorField, EditorMode, EditorOutcome, EditorSession,
    FieldConfig, FieldKind, InputField, RichTextWidget, TextareaWidget,
};
pub use highlighter::{DrawAll, Highlighter, HighlighterConfig};
pub use line_number_selector::{ClickRange, LineNumberConfig, LineNumberSelector, ModifierKey};
pub use range::{NormalizedRange, RangeError};
pub use registry::{Component, ComponentError, ComponentKind, Components};
pub use signal::{Position, Signal};
pub use store::{
    Anonymous, AnnotationStore, AuthorizationPolicy, Collaborators, IdentityPolicy, MemoryStore,
    PermitAll, StoreAction, StoreCallback, StoreError, StoreResponse, StoreResult,
};
pub use text_selector::{PointerInfo, SelectionOutcome, TextSelector};
pub use viewer::{Viewer, ViewerConfig};
