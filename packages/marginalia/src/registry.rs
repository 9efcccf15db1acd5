//! The static registry of annotator components.

use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::Sender;

use marginalia_dom::BaseDocument;

use crate::annotator::Message;
use crate::block_counters::BlockCounters;
use crate::config::{AnnotatorConfig, ConfigError};
use crate::editor::{Editor, RichTextWidget};
use crate::highlighter::Highlighter;
use crate::line_number_selector::LineNumberSelector;
use crate::text_selector::TextSelector;
use crate::viewer::Viewer;

/// Raised while building a component or one of its parts. The part is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// A required element is missing from the page
    MissingElement(String),
    /// An editor field type that isn't supported
    UnsupportedField(String),
    /// An endpoint url that doesn't resolve against the document's base url
    InvalidUrl(String),
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingElement(id) => write!(f, "element #{id} not found"),
            Self::UnsupportedField(kind) => write!(f, "unsupported field type {kind:?}"),
            Self::InvalidUrl(url) => write!(f, "can't resolve url {url:?}"),
        }
    }
}

impl std::error::Error for ComponentError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    TextSelector,
    LineNumberSelector,
    Highlighter,
    Editor,
    Viewer,
    BlockCounters,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::TextSelector,
        ComponentKind::LineNumberSelector,
        ComponentKind::Highlighter,
        ComponentKind::Editor,
        ComponentKind::Viewer,
        ComponentKind::BlockCounters,
    ];

    /// Built when the configuration doesn't name components
    pub const DEFAULT: [ComponentKind; 5] = [
        ComponentKind::TextSelector,
        ComponentKind::Highlighter,
        ComponentKind::Editor,
        ComponentKind::Viewer,
        ComponentKind::BlockCounters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::TextSelector => "text-selector",
            ComponentKind::LineNumberSelector => "line-number-selector",
            ComponentKind::Highlighter => "highlighter",
            ComponentKind::Editor => "editor",
            ComponentKind::Viewer => "viewer",
            ComponentKind::BlockCounters => "block-counters",
        }
    }

    pub(crate) fn build(self, cx: &mut BuildContext<'_>) -> Result<Component, ComponentError> {
        let config = cx.config;
        Ok(match self {
            ComponentKind::TextSelector => Component::TextSelector(TextSelector::new(
                cx.root,
                vec![
                    config.highlighter.highlight_class.clone(),
                    config.highlighter.temp_highlight_class.clone(),
                ],
            )),
            ComponentKind::LineNumberSelector => Component::LineNumberSelector(LineNumberSelector::new(
                config.line_numbers.clone(),
                cx.root,
            )),
            ComponentKind::Highlighter => {
                Component::Highlighter(Highlighter::new(config.highlighter.clone(), cx.root))
            }
            ComponentKind::Editor => Component::Editor(Editor::new(
                cx.doc,
                config.editor.clone(),
                cx.chrome_parent,
                cx.rich_text.take(),
            )),
            ComponentKind::Viewer => Component::Viewer(Viewer::new(
                cx.doc,
                config.viewer.clone(),
                cx.chrome_parent,
                cx.root,
            )?),
            ComponentKind::BlockCounters => Component::BlockCounters(BlockCounters::new(
                cx.doc,
                config.block_counters.clone(),
                cx.chrome_parent,
                cx.root,
                cx.sender.clone(),
            )?),
        })
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownComponent(name.to_string()))
    }
}

/// What components are built from
pub(crate) struct BuildContext<'a> {
    pub doc: &'a mut BaseDocument,
    pub config: &'a AnnotatorConfig,
    pub root: usize,
    /// Element the components' own UI is appended to
    pub chrome_parent: usize,
    pub sender: &'a Sender<Message>,
    pub rich_text: Option<Box<dyn RichTextWidget>>,
}

pub enum Component {
    TextSelector(TextSelector),
    LineNumberSelector(LineNumberSelector),
    Highlighter(Highlighter),
    Editor(Editor),
    Viewer(Viewer),
    BlockCounters(BlockCounters),
}

/// The components an annotator was built with
#[derive(Default)]
pub struct Components {
    pub text_selector: Option<TextSelector>,
    pub line_numbers: Option<LineNumberSelector>,
    pub highlighter: Option<Highlighter>,
    pub editor: Option<Editor>,
    pub viewer: Option<Viewer>,
    pub block_counters: Option<BlockCounters>,
}

impl Components {
    pub(crate) fn insert(&mut self, component: Component) {
        match component {
            Component::TextSelector(c) => self.text_selector = Some(c),
            Component::LineNumberSelector(c) => self.line_numbers = Some(c),
            Component::Highlighter(c) => self.highlighter = Some(c),
            Component::Editor(c) => self.editor = Some(c),
            Component::Viewer(c) => self.viewer = Some(c),
            Component::BlockCounters(c) => self.block_counters = Some(c),
        }
    }

    pub fn kinds(&self) -> Vec<ComponentKind> {
        let present = [
            self.text_selector.is_some(),
            self.line_numbers.is_some(),
            self.highlighter.is_some(),
            self.editor.is_some(),
            self.viewer.is_some(),
            self.block_counters.is_some(),
        ];
        ComponentKind::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(kind, present)| present.then_some(kind))
            .collect()
    }

    pub(crate) fn set_root(&mut self, root: usize) {
        if let Some(c) = &mut self.text_selector {
            c.set_root(root);
        }
        if let Some(c) = &mut self.line_numbers {
            c.set_root(root);
        }
        if let Some(c) = &mut self.highlighter {
            c.set_root(root);
        }
        if let Some(c) = &mut self.viewer {
            c.set_root(root);
        }
        if let Some(c) = &mut self.block_counters {
            c.set_root(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in ComponentKind::ALL {
            assert_eq!(kind.name().parse::<ComponentKind>().unwrap(), kind);
        }
        assert!("store".parse::<ComponentKind>().is_err());
    }
}
