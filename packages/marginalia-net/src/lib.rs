//! Networking (HTTP, filesystem, Data URIs) for marginalia
//!
//! Provides an implementation of the [`marginalia_traits::net::NetProvider`] trait, used to
//! fetch block annotation counts and the annotations of a single block.

use data_url::DataUrl;
use marginalia_traits::net::{BoxedHandler, Bytes, NetProvider, NetWaker, Request};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;

const USER_AGENT: &str = concat!("marginalia/", env!("CARGO_PKG_VERSION"));

type Client = reqwest::Client;

pub struct Provider {
    rt: Handle,
    client: Client,
    waker: Arc<dyn NetWaker>,
}
impl Provider {
    /// Create a provider which spawns its requests onto the current tokio runtime.
    ///
    /// Must be called from within a runtime context.
    pub fn new(waker: Option<Arc<dyn NetWaker>>) -> Result<Self, ProviderError> {
        let builder = reqwest::Client::builder().user_agent(USER_AGENT);
        #[cfg(feature = "cookies")]
        let builder = builder.cookie_store(true);
        let client = builder.build()?;

        let waker = waker.unwrap_or(Arc::new(DummyNetWaker));
        Ok(Self {
            rt: Handle::try_current()?,
            client,
            waker,
        })
    }
    pub fn shared(waker: Option<Arc<dyn NetWaker>>) -> Result<Arc<dyn NetProvider>, ProviderError> {
        Ok(Arc::new(Self::new(waker)?))
    }
    pub fn is_empty(&self) -> bool {
        Arc::strong_count(&self.waker) == 1
    }
    pub fn count(&self) -> usize {
        Arc::strong_count(&self.waker) - 1
    }
}
impl Provider {
    async fn fetch_inner(client: Client, request: Request) -> Result<(String, Bytes), ProviderError> {
        Ok(match request.url.scheme() {
            "data" => {
                let data_url = DataUrl::process(request.url.as_str())?;
                let decoded = data_url.decode_to_vec()?;
                (request.url.to_string(), Bytes::from(decoded.0))
            }
            "file" => {
                let path = request
                    .url
                    .to_file_path()
                    .map_err(|_| ProviderError::InvalidFilePath(request.url.to_string()))?;
                let file_content = tokio::fs::read(path).await?;
                (request.url.to_string(), Bytes::from(file_content))
            }
            _ => {
                let mut builder = client
                    .request(request.method, request.url)
                    .headers(request.headers);
                if !request.content_type.is_empty() {
                    builder = builder.header("Content-Type", request.content_type.as_str());
                }
                if !request.body.is_empty() {
                    builder = builder.body(request.body);
                }
                let response = builder.send().await?.error_for_status()?;

                (response.url().to_string(), response.bytes().await?)
            }
        })
    }

    pub async fn fetch_async(&self, request: Request) -> Result<(String, Bytes), ProviderError> {
        #[cfg(feature = "tracing")]
        let url = request.url.to_string();

        let client = self.client.clone();
        let result = Self::fetch_inner(client, request).await;

        #[cfg(feature = "tracing")]
        match &result {
            Ok(_) => tracing::trace!("Success {url}"),
            Err(e) => tracing::warn!("Error fetching {url}: {e}"),
        }

        result
    }
}

impl NetProvider for Provider {
    fn fetch(&self, doc_id: usize, request: Request, handler: BoxedHandler) {
        let client = self.client.clone();

        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching {}", &request.url);

        let waker = self.waker.clone();
        self.rt.spawn(async move {
            #[cfg(feature = "tracing")]
            let url = request.url.to_string();

            let result = Self::fetch_inner(client, request).await;

            match result {
                Ok((response_url, bytes)) => {
                    handler.bytes(response_url, bytes);
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Success {url}");
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Error fetching {url}: {e}");
                    handler.error(e.to_string());
                }
            };

            // Call the waker to notify of completed network request
            waker.wake(doc_id);
        });
    }
}

#[derive(Debug)]
pub enum ProviderError {
    Io(std::io::Error),
    NoRuntime(tokio::runtime::TryCurrentError),
    InvalidFilePath(String),
    DataUrl(data_url::DataUrlError),
    DataUrlBase64(data_url::forgiving_base64::InvalidBase64),
    ReqwestError(reqwest::Error),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::NoRuntime(e) => write!(f, "no tokio runtime: {e}"),
            Self::InvalidFilePath(url) => write!(f, "not a valid file path: {url}"),
            Self::DataUrl(e) => write!(f, "invalid data url: {e:?}"),
            Self::DataUrlBase64(e) => write!(f, "invalid base64 in data url: {e:?}"),
            Self::ReqwestError(e) => write!(f, "request failed: {e}"),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::NoRuntime(e) => Some(e),
            Self::ReqwestError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<tokio::runtime::TryCurrentError> for ProviderError {
    fn from(value: tokio::runtime::TryCurrentError) -> Self {
        Self::NoRuntime(value)
    }
}

impl From<data_url::DataUrlError> for ProviderError {
    fn from(value: data_url::DataUrlError) -> Self {
        Self::DataUrl(value)
    }
}

impl From<data_url::forgiving_base64::InvalidBase64> for ProviderError {
    fn from(value: data_url::forgiving_base64::InvalidBase64) -> Self {
        Self::DataUrlBase64(value)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::ReqwestError(value)
    }
}

struct DummyNetWaker;
impl NetWaker for DummyNetWaker {
    fn wake(&self, _client_id: usize) {}
}
