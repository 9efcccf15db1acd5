use marginalia_traits::{Viewport, net::NetProvider, shell::ShellProvider};
use std::sync::Arc;

/// Options used when constructing a [`BaseDocument`](crate::BaseDocument)
#[derive(Default)]
pub struct DocumentConfig {
    /// The initial `Viewport`
    pub viewport: Option<Viewport>,
    /// The base url which relative URLs are resolved against
    pub base_url: Option<String>,
    /// Net provider to handle network requests
    pub net_provider: Option<Arc<dyn NetProvider>>,
    /// Shell provider for redraw requests, alerts and confirmations
    pub shell_provider: Option<Arc<dyn ShellProvider>>,
}
