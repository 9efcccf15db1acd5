//! The headless DOM behind marginalia
//!
//! This crate implements a small DOM ([`BaseDocument`]) designed to be embedded in and
//! "driven" by external code: a host parses a page into it (see `marginalia-html`),
//! feeds it layout boxes and input events, and the annotation UI reads and mutates it.
//!
//! It includes: a slab-backed tree of nodes, a [`DocumentMutator`] for structural
//! changes (including the text node splitting and merging that range normalization
//! and highlighting rely on), pre-order and ancestor traversal, `nth-of-type` selector
//! queries, the native text [`Selection`] and simple box-based hit testing.

/// The DOM implementation.
///
/// This is the primary entry point for this crate.
mod document;

/// The nodes themselves, and their data.
pub mod node;

mod config;
mod events;
mod mutator;
mod query_selector;
mod selection;
mod traversal;

pub mod util;

pub use config::DocumentConfig;
pub use document::BaseDocument;
pub use events::HitResult;
pub use markup5ever::{LocalName, Namespace, QualName};
pub use mutator::{AppendTextErr, DocumentMutator};
pub use node::{Attribute, ElementData, Node, NodeData, NodeKind, TextNodeData};
pub use query_selector::{NthOfTypeSelector, NthOfTypeStep};
pub use selection::{Boundary, LiveRange, Selection};
pub use traversal::{AncestorTraverser, TreeTraverser};
pub use util::{Point, html_name};
