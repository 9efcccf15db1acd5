mod attributes;
mod element;
#[allow(clippy::module_inception)]
mod node;

pub use attributes::{Attribute, Attributes};
pub use element::ElementData;
pub use node::{Node, NodeData, NodeKind, TextNodeData};
