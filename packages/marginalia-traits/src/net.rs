pub use bytes::Bytes;
pub use http::{self, HeaderMap, Method};
use std::sync::Arc;
pub use url::Url;

pub type SharedProvider = Arc<dyn NetProvider>;
pub type BoxedHandler = Box<dyn NetHandler>;

/// A type that fetches resources for a Document.
///
/// This may be over the network via http(s), via the filesystem, or some other method.
pub trait NetProvider: Send + Sync + 'static {
    fn fetch(&self, doc_id: usize, request: Request, handler: BoxedHandler);
}

/// A type that receives the raw bytes of a completed request.
///
/// Handlers run on whatever thread the provider completes on, so they usually just
/// forward the parsed result to the owner of the document through a channel.
pub trait NetHandler: Send + Sync + 'static {
    fn bytes(self: Box<Self>, resolved_url: String, bytes: Bytes);

    /// Called instead of [`NetHandler::bytes`] when the request failed.
    fn error(self: Box<Self>, message: String) {
        let _ = message;
    }
}

/// Notified whenever a request completes, so that a host event loop can wake up and
/// poll the document.
pub trait NetWaker: Send + Sync + 'static {
    fn wake(&self, client_id: usize);
}

#[non_exhaustive]
#[derive(Debug, Clone)]
/// A request type loosely representing https://fetch.spec.whatwg.org/#requests
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub content_type: String,
    pub body: Bytes,
}

impl Request {
    /// A get request to the specified Url and an empty body
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            content_type: String::new(),
            body: Bytes::new(),
        }
    }
}

/// A default noop NetProvider
#[derive(Default)]
pub struct DummyNetProvider;
impl NetProvider for DummyNetProvider {
    fn fetch(&self, _doc_id: usize, _request: Request, _handler: BoxedHandler) {}
}

pub struct DummyNetWaker;
impl NetWaker for DummyNetWaker {
    fn wake(&self, _client_id: usize) {}
}
