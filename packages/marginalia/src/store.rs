//! The collaborators the annotator delegates to: storage, authorization, identity.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::annotation::{Annotation, AnnotationId};
use crate::editor::RichTextWidget;

/// What storage answered to a request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreResponse {
    /// The stored annotation, when storage returns it (e.g. with its assigned id)
    pub annotation: Option<Annotation>,
    /// A message to show to the user
    pub message: Option<String>,
}

#[derive(Debug)]
pub enum StoreError {
    /// Storage refused the request
    Rejected(String),
    /// Storage could not be reached
    Unavailable(String),
    Json(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(message) => write!(f, "{message}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::Json(err) => write!(f, "invalid annotation data: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

pub type StoreResult = Result<StoreResponse, StoreError>;

/// Called once when a storage request completes. May be called from any thread.
pub type StoreCallback = Box<dyn FnOnce(StoreResult) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreAction {
    Create,
    Update,
    Delete,
}

/// Persists annotations. Payloads never carry UI state.
pub trait AnnotationStore {
    fn create(&self, payload: Annotation, done: StoreCallback);
    fn update(&self, payload: Annotation, done: StoreCallback);
    fn delete(&self, payload: Annotation, done: StoreCallback);
}

/// Decides whether `user` may perform `action` (`"update"`, `"delete"`) on an annotation
pub trait AuthorizationPolicy {
    fn permits(&self, action: &str, annotation: &Annotation, user: Option<&str>) -> bool;
}

pub struct PermitAll;

impl AuthorizationPolicy for PermitAll {
    fn permits(&self, _action: &str, _annotation: &Annotation, _user: Option<&str>) -> bool {
        true
    }
}

/// Names the current user
pub trait IdentityPolicy {
    fn who(&self) -> Option<String>;
}

pub struct Anonymous;

impl IdentityPolicy for Anonymous {
    fn who(&self) -> Option<String> {
        None
    }
}

/// An in-process store that assigns sequential integer ids and completes immediately
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    annotations: Mutex<Vec<Annotation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the stored annotations
    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations
            .lock()
            .map(|stored| stored.clone())
            .unwrap_or_default()
    }

    fn with_stored<T>(&self, f: impl FnOnce(&mut Vec<Annotation>) -> T) -> Result<T, StoreError> {
        let mut stored = self
            .annotations
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(f(&mut stored))
    }
}

impl AnnotationStore for MemoryStore {
    fn create(&self, mut payload: Annotation, done: StoreCallback) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        payload.id = Some(AnnotationId::Int(id));
        let result = self.with_stored(|stored| {
            stored.push(payload.clone());
            StoreResponse {
                annotation: Some(payload),
                message: None,
            }
        });
        done(result);
    }

    fn update(&self, payload: Annotation, done: StoreCallback) {
        let result = self.with_stored(|stored| {
            match stored.iter_mut().find(|existing| existing.id == payload.id) {
                Some(existing) => {
                    *existing = payload.clone();
                    Ok(StoreResponse {
                        annotation: Some(payload),
                        message: None,
                    })
                }
                None => Err(StoreError::Rejected("no such annotation".to_string())),
            }
        });
        done(result.and_then(|inner| inner));
    }

    fn delete(&self, payload: Annotation, done: StoreCallback) {
        let result = self.with_stored(|stored| {
            let before = stored.len();
            stored.retain(|existing| existing.id != payload.id);
            if stored.len() == before {
                Err(StoreError::Rejected("no such annotation".to_string()))
            } else {
                Ok(StoreResponse {
                    annotation: None,
                    message: Some("Annotation deleted".to_string()),
                })
            }
        });
        done(result.and_then(|inner| inner));
    }
}

/// Everything the annotator needs from its host besides the document
pub struct Collaborators {
    pub store: Box<dyn AnnotationStore>,
    pub authorization: Box<dyn AuthorizationPolicy>,
    pub identity: Box<dyn IdentityPolicy>,
    /// Editor body widget; a plain textarea when `None`
    pub rich_text: Option<Box<dyn RichTextWidget>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            authorization: Box::new(PermitAll),
            identity: Box::new(Anonymous),
            rich_text: None,
        }
    }
}
