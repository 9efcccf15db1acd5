//! Fakes shared by the unit tests

use std::sync::{Arc, Mutex};

use marginalia_dom::{BaseDocument, DocumentConfig};
use marginalia_html::HtmlDocument;
use marginalia_traits::shell::ShellProvider;
use marginalia_traits::net::{BoxedHandler, Bytes, NetProvider, Request};

use crate::annotation::Annotation;
use crate::store::{AnnotationStore, StoreAction, StoreCallback, StoreResult};

pub(crate) fn parse(html: &str) -> BaseDocument {
    HtmlDocument::from_html(html, DocumentConfig::default()).into_inner()
}

/// Answers every confirmation the same way and remembers what was asked
pub(crate) struct RecordingShell {
    answer: bool,
    alerts: Mutex<Vec<String>>,
    confirmations: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub(crate) fn confirming(answer: bool) -> Self {
        Self {
            answer,
            alerts: Mutex::default(),
            confirmations: Mutex::default(),
        }
    }

    pub(crate) fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub(crate) fn confirmations(&self) -> Vec<String> {
        self.confirmations.lock().unwrap().clone()
    }
}

impl ShellProvider for RecordingShell {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn confirm(&self, message: &str) -> bool {
        self.confirmations.lock().unwrap().push(message.to_string());
        self.answer
    }
}

/// Holds on to requests until a test answers them
#[derive(Default)]
pub(crate) struct QueuedNet {
    requests: Mutex<Vec<(String, Option<BoxedHandler>)>>,
}

impl QueuedNet {
    pub(crate) fn urls(&self) -> Vec<String> {
        let requests = self.requests.lock().unwrap();
        requests.iter().map(|(url, _)| url.clone()).collect()
    }

    fn take(&self, index: usize) -> (String, BoxedHandler) {
        let mut requests = self.requests.lock().unwrap();
        let (url, handler) = &mut requests[index];
        let handler = handler.take().expect("request already answered");
        (url.clone(), handler)
    }

    pub(crate) fn respond(&self, index: usize, body: &str) {
        let (url, handler) = self.take(index);
        handler.bytes(url, Bytes::copy_from_slice(body.as_bytes()));
    }

    pub(crate) fn fail(&self, index: usize, message: &str) {
        let (_, handler) = self.take(index);
        handler.error(message.to_string());
    }
}

impl NetProvider for QueuedNet {
    fn fetch(&self, _doc_id: usize, request: Request, handler: BoxedHandler) {
        let mut requests = self.requests.lock().unwrap();
        requests.push((request.url.to_string(), Some(handler)));
    }
}

type StoreRequest = (StoreAction, Annotation, Option<StoreCallback>);

/// A store whose requests stay pending until completed by the test
#[derive(Clone, Default)]
pub(crate) struct RecordingStore {
    requests: Arc<Mutex<Vec<StoreRequest>>>,
}

impl RecordingStore {
    pub(crate) fn requests(&self) -> Vec<(StoreAction, Annotation)> {
        let requests = self.requests.lock().unwrap();
        requests
            .iter()
            .map(|(action, payload, _)| (*action, payload.clone()))
            .collect()
    }

    pub(crate) fn complete(&self, index: usize, result: StoreResult) {
        let done = self.requests.lock().unwrap()[index]
            .2
            .take()
            .expect("request already completed");
        done(result);
    }

    fn push(&self, action: StoreAction, payload: Annotation, done: StoreCallback) {
        self.requests.lock().unwrap().push((action, payload, Some(done)));
    }
}

impl AnnotationStore for RecordingStore {
    fn create(&self, payload: Annotation, done: StoreCallback) {
        self.push(StoreAction::Create, payload, done);
    }

    fn update(&self, payload: Annotation, done: StoreCallback) {
        self.push(StoreAction::Update, payload, done);
    }

    fn delete(&self, payload: Annotation, done: StoreCallback) {
        self.push(StoreAction::Delete, payload, done);
    }
}
