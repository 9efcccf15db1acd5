use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block_counters::BlockCounterConfig;
use crate::editor::EditorConfig;
use crate::highlighter::HighlighterConfig;
use crate::line_number_selector::LineNumberConfig;
use crate::registry::ComponentKind;
use crate::viewer::ViewerConfig;

#[derive(Debug)]
pub enum ConfigError {
    /// A component name that isn't in the registry
    UnknownComponent(String),
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    /// The configured document element doesn't exist
    MissingDocumentElement(String),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownComponent(name) => write!(f, "unknown component {name:?}"),
            Self::InvalidUrl { url, source } => write!(f, "invalid url {url:?}: {source}"),
            Self::MissingDocumentElement(id) => write!(f, "no document element {id:?}"),
            Self::Json(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidUrl { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Configuration of an [`Annotator`](crate::Annotator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Id of the element whose text is annotated. Defaults to `<body>`.
    pub document_element: Option<String>,
    /// Identifier of the annotated document, reported with `document-element-changed`
    pub document_id: Option<String>,
    /// Base url that endpoint urls are resolved against
    pub base_url: Option<String>,
    /// Names of the components to build, in order
    pub components: Vec<String>,
    pub highlighter: HighlighterConfig,
    pub editor: EditorConfig,
    pub viewer: ViewerConfig,
    pub block_counters: BlockCounterConfig,
    pub line_numbers: LineNumberConfig,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            document_element: None,
            document_id: None,
            base_url: None,
            components: ComponentKind::DEFAULT
                .iter()
                .map(|kind| kind.name().to_string())
                .collect(),
            highlighter: HighlighterConfig::default(),
            editor: EditorConfig::default(),
            viewer: ViewerConfig::default(),
            block_counters: BlockCounterConfig::default(),
            line_numbers: LineNumberConfig::default(),
        }
    }
}

impl AnnotatorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configured components, rejecting names the registry doesn't know
    pub fn component_kinds(&self) -> Result<Vec<ComponentKind>, ConfigError> {
        self.components.iter().map(|name| name.parse()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_json() {
        let config = AnnotatorConfig::from_json(
            r#"{
                "document_element": "poem",
                "components": ["text-selector", "highlighter", "line-number-selector"],
                "highlighter": {"chunk_size": 50},
                "line_numbers": {"modifier": "alt", "line_height": 20.0},
                "editor": {"fields": [{"type": "checkbox", "key": "private", "label": "Private"}]}
            }"#,
        )
        .unwrap();

        assert_eq!(config.document_element.as_deref(), Some("poem"));
        assert_eq!(config.highlighter.chunk_size, 50);
        assert_eq!(config.highlighter.highlight_class, "annotator-hl");
        assert_eq!(config.editor.offset_top, 64.0);
        assert_eq!(config.editor.fields[0].key, "private");
        assert_eq!(
            config.component_kinds().unwrap(),
            [
                ComponentKind::TextSelector,
                ComponentKind::Highlighter,
                ComponentKind::LineNumberSelector
            ]
        );
    }

    #[test]
    fn unknown_components_are_rejected() {
        let config = AnnotatorConfig {
            components: vec!["highlighter".into(), "permissions".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.component_kinds(),
            Err(ConfigError::UnknownComponent(name)) if name == "permissions"
        ));
    }

    #[test]
    fn default_components_exclude_line_numbers() {
        let kinds = AnnotatorConfig::default().component_kinds().unwrap();
        assert_eq!(kinds.len(), 5);
        assert!(!kinds.contains(&ComponentKind::LineNumberSelector));
    }
}
