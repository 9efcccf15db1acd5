//! The annotation model and the record formats it is exchanged in.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to an annotation by storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationId {
    Int(i64),
    Str(String),
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationId::Int(id) => write!(f, "{id}"),
            AnnotationId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for AnnotationId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A range in its durable form: two position identifiers relative to the annotated root,
/// plus character offsets into the text content of the identified elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedRange {
    pub start: String,
    pub end: String,
    #[serde(alias = "startOffset", deserialize_with = "offset")]
    pub start_offset: usize,
    #[serde(alias = "endOffset", deserialize_with = "offset")]
    pub end_offset: usize,
}

/// Offsets arrive as numbers from annotation stores and as strings from some model
/// serializers.
fn offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawOffset {
        Number(usize),
        Text(String),
    }

    match RawOffset::deserialize(deserializer)? {
        RawOffset::Number(n) => Ok(n),
        RawOffset::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// UI-only state of an annotation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    /// Highlight span node ids currently drawn for this annotation
    pub highlights: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AnnotationId>,
    /// The note body
    #[serde(default)]
    pub text: String,
    /// The selected text, one entry per range joined with `" / "`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub quote: String,
    #[serde(default)]
    pub ranges: Vec<SerializedRange>,
    /// Fields contributed by editor fields and other extensions
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub local: LocalState,
}

/// An annotation shared between the UI components.
pub type AnnotationRef = Rc<RefCell<Annotation>>;

impl Annotation {
    pub fn new(text: impl Into<String>, ranges: Vec<SerializedRange>) -> Self {
        Self {
            text: text.into(),
            ranges,
            ..Default::default()
        }
    }

    pub fn into_ref(self) -> AnnotationRef {
        Rc::new(RefCell::new(self))
    }

    /// A copy of the annotation with the UI-only state stripped, suitable for handing to
    /// storage.
    pub fn payload(&self) -> Annotation {
        Annotation {
            local: LocalState::default(),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Annotations without ranges are never persisted
    pub fn is_persistable(&self) -> bool {
        !self.ranges.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationRecord {
    Model(ModelRecord),
    Plain(Annotation),
}

/// The shape produced by model serializers: `{"pk": 3, "model": "...", "fields": {...}}`
#[derive(Deserialize)]
struct ModelRecord {
    pk: AnnotationId,
    fields: ModelFields,
}

#[derive(Deserialize)]
struct ModelFields {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    quote: Option<String>,
    #[serde(default)]
    ranges: Vec<ModelRange>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelRange {
    Wrapped { fields: SerializedRange },
    Bare(SerializedRange),
}

impl From<AnnotationRecord> for Annotation {
    fn from(record: AnnotationRecord) -> Self {
        match record {
            AnnotationRecord::Plain(annotation) => annotation,
            AnnotationRecord::Model(ModelRecord { pk, fields }) => Annotation {
                id: Some(pk),
                text: fields.text.unwrap_or_default(),
                quote: fields.quote.unwrap_or_default(),
                ranges: fields
                    .ranges
                    .into_iter()
                    .map(|range| match range {
                        ModelRange::Wrapped { fields } => fields,
                        ModelRange::Bare(range) => range,
                    })
                    .collect(),
                extra: fields.extra,
                local: LocalState::default(),
            },
        }
    }
}

/// Decode a list of annotation records, accepting both plain annotations and model
/// serializations.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Annotation>, serde_json::Error> {
    let records: Vec<AnnotationRecord> = serde_json::from_slice(bytes)?;
    Ok(records.into_iter().map(Annotation::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn range() -> SerializedRange {
        SerializedRange {
            start: "/p[1]".into(),
            end: "/p[1]".into(),
            start_offset: 6,
            end_offset: 11,
        }
    }

    #[test]
    fn payload_strips_local_state() {
        let mut annotation = Annotation::new("greeting", vec![range()]);
        annotation.local.highlights = vec![4, 5];
        annotation.extra.insert("private".into(), json!(true));

        let payload = annotation.payload();
        assert!(payload.local.highlights.is_empty());
        assert_eq!(
            payload.to_json().unwrap(),
            json!({
                "text": "greeting",
                "ranges": [{"start": "/p[1]", "end": "/p[1]", "start_offset": 6, "end_offset": 11}],
                "private": true,
            })
        );
    }

    #[test]
    fn decodes_plain_and_model_records() {
        let body = json!([
            {"id": 1, "text": "plain", "ranges": [{"start": "/p[1]", "end": "/p[1]", "startOffset": 6, "endOffset": 11}]},
            {"pk": 7, "model": "annotator.annotation", "fields": {
                "text": "model",
                "ranges": [{"model": "annotator.range", "fields": {"start": "/p[1]", "end": "/p[1]", "start_offset": "6", "end_offset": "11"}}],
                "private": false
            }}
        ]);
        let annotations = decode_records(body.to_string().as_bytes()).unwrap();

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].id, Some(AnnotationId::Int(1)));
        assert_eq!(annotations[0].ranges, vec![range()]);
        assert_eq!(annotations[1].id, Some(AnnotationId::Int(7)));
        assert_eq!(annotations[1].text, "model");
        assert_eq!(annotations[1].ranges, vec![range()]);
        assert_eq!(annotations[1].extra.get("private"), Some(&json!(false)));
    }
}
