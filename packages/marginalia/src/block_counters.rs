//! Per-block annotation count badges.
//!
//! Counts are fetched from the server and rendered as clickable badges in a counts
//! column, aligned with the block they count. Clicking a badge fetches the block's
//! annotations, which are then shown in the viewer.

use std::sync::mpsc::Sender;

use marginalia_dom::BaseDocument;
use marginalia_traits::net::{Bytes, NetHandler, Request};
use marginalia_traits::{DomEvent, DomEventData};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::annotation::decode_records;
use crate::annotator::Message;
use crate::chrome;
use crate::position;
use crate::registry::ComponentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockCounterConfig {
    /// Endpoint returning a list of [`BlockCount`]s
    pub counts_url: String,
    /// Endpoint prefix for a block's annotations; the block parameter is appended
    pub annotations_url: String,
    /// Id of the element badges are rendered into
    pub container_id: String,
}

impl Default for BlockCounterConfig {
    fn default() -> Self {
        Self {
            counts_url: "annotator/counts".to_string(),
            annotations_url: "annotator/get".to_string(),
            container_id: "counts".to_string(),
        }
    }
}

/// The number of annotations in one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCount {
    /// Position identifier of the block
    pub block_id: String,
    pub num_annotations_in_block: u64,
}

struct CountsHandler {
    sender: Sender<Message>,
}

impl NetHandler for CountsHandler {
    fn bytes(self: Box<Self>, resolved_url: String, bytes: Bytes) {
        match serde_json::from_slice::<Vec<BlockCount>>(&bytes) {
            Ok(counts) => {
                let _ = self.sender.send(Message::Counts(counts));
            }
            Err(err) => tracing::warn!(url = %resolved_url, %err, "invalid block counts"),
        }
    }

    fn error(self: Box<Self>, message: String) {
        tracing::warn!(%message, "failed to fetch block counts");
    }
}

struct BlockAnnotationsHandler {
    block_id: String,
    sender: Sender<Message>,
}

impl NetHandler for BlockAnnotationsHandler {
    fn bytes(self: Box<Self>, resolved_url: String, bytes: Bytes) {
        match decode_records(&bytes) {
            Ok(annotations) => {
                let _ = self.sender.send(Message::BlockAnnotations {
                    block_id: self.block_id,
                    annotations,
                });
            }
            Err(err) => tracing::warn!(url = %resolved_url, %err, "invalid annotation records"),
        }
    }

    fn error(self: Box<Self>, message: String) {
        tracing::warn!(block = %self.block_id, %message, "failed to fetch block annotations");
    }
}

struct Badge {
    element: usize,
    block_id: String,
}

pub struct BlockCounters {
    root: usize,
    container: usize,
    counts_url: Url,
    annotations_url: Url,
    badges: Vec<Badge>,
    sender: Sender<Message>,
}

fn resolve_endpoint(doc: &BaseDocument, raw: &str) -> Result<Url, ComponentError> {
    doc.resolve_url(raw)
        .ok_or_else(|| ComponentError::InvalidUrl(raw.to_string()))
}

impl BlockCounters {
    pub(crate) fn new(
        doc: &mut BaseDocument,
        config: BlockCounterConfig,
        chrome_parent: usize,
        root: usize,
        sender: Sender<Message>,
    ) -> Result<Self, ComponentError> {
        let counts_url = resolve_endpoint(doc, &config.counts_url)?;
        // Keep a trailing slash so block parameters are joined below the prefix
        let annotations_url = resolve_endpoint(
            doc,
            &format!("{}/", config.annotations_url.trim_end_matches('/')),
        )?;

        let mut m = doc.mutate();
        let container = match m.doc.get_element_by_id(&config.container_id) {
            Some(container) => container,
            None => {
                let container = chrome::create_element(&mut m, "div", "");
                m.set_attribute(container, marginalia_dom::html_name("id"), &config.container_id);
                m.append_children(chrome_parent, &[container]);
                container
            }
        };
        m.add_class(container, "annotator-counts");
        drop(m);

        Ok(Self {
            root,
            container,
            counts_url,
            annotations_url,
            badges: Vec::new(),
            sender,
        })
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
    }

    pub fn container(&self) -> usize {
        self.container
    }

    /// Badge element ids with the block they count
    pub fn badges(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.badges
            .iter()
            .map(|badge| (badge.element, badge.block_id.as_str()))
    }

    /// Remove the current badges and request fresh counts
    pub fn refresh(&mut self, doc: &mut BaseDocument) {
        self.clear(doc);
        let handler = CountsHandler {
            sender: self.sender.clone(),
        };
        doc.net_provider
            .fetch(doc.id(), Request::get(self.counts_url.clone()), Box::new(handler));
    }

    /// Remove every badge
    pub fn clear(&mut self, doc: &mut BaseDocument) {
        let mut m = doc.mutate();
        for badge in self.badges.drain(..) {
            m.remove_and_drop_node(badge.element);
        }
    }

    /// Render a badge next to every block that resolves
    pub fn apply_counts(&mut self, doc: &mut BaseDocument, counts: Vec<BlockCount>) {
        self.clear(doc);
        for count in counts {
            let Some(block) = position::resolve(doc, &count.block_id, self.root) else {
                tracing::debug!(block = %count.block_id, "count for a block that isn't in the document");
                continue;
            };
            let top = doc.absolute_position(block).y;

            let mut m = doc.mutate();
            let element = chrome::append_element_with_text(
                &mut m,
                self.container,
                "a",
                "counter unselectable",
                &count.num_annotations_in_block.to_string(),
            );
            chrome::place_at(&mut m, element, top, None);
            drop(m);

            self.badges.push(Badge {
                element,
                block_id: count.block_id,
            });
        }
        doc.shell_provider.request_redraw();
    }

    /// Fetch the annotations of the block whose badge was clicked
    pub fn handle_event(&mut self, doc: &mut BaseDocument, event: &DomEvent) {
        if !matches!(event.data, DomEventData::Click(_)) {
            return;
        }
        let Some(badge) = event
            .composed_path()
            .iter()
            .find_map(|id| self.badges.iter().find(|badge| badge.element == *id))
        else {
            return;
        };
        self.fetch_block(doc, &badge.block_id);
    }

    pub fn fetch_block(&self, doc: &BaseDocument, block_id: &str) {
        let param = position::block_url_param(block_id);
        let url = match self.annotations_url.join(&param) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(block = %block_id, %err, "couldn't build block annotations url");
                return;
            }
        };
        let handler = BlockAnnotationsHandler {
            block_id: block_id.to_string(),
            sender: self.sender.clone(),
        };
        doc.net_provider
            .fetch(doc.id(), Request::get(url), Box::new(handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{QueuedNet, parse};
    use kurbo::Rect;
    use marginalia_traits::MouseButtonEvent;
    use std::sync::Arc;
    use std::sync::mpsc::channel;

    #[test]
    fn refresh_renders_badges_at_block_tops() {
        let mut doc = parse("<p>one</p><ol><li>a</li><li>b</li></ol>");
        doc.set_base_url("https://example.org/poems/1/").unwrap();
        let net = Arc::new(QueuedNet::default());
        doc.set_net_provider(net.clone());
        let body = doc.body().unwrap();
        let (sender, receiver) = channel();

        let ol = doc.first_element_with_tag(body, "ol").unwrap();
        let second = doc.element_children(ol).nth(1).unwrap().id;
        doc.mutate().set_layout(ol, Rect::new(0.0, 100.0, 500.0, 140.0));
        doc.mutate().set_layout(second, Rect::new(0.0, 20.0, 500.0, 40.0));

        let mut counters =
            BlockCounters::new(&mut doc, BlockCounterConfig::default(), body, body, sender).unwrap();
        counters.refresh(&mut doc);
        assert_eq!(net.urls(), ["https://example.org/poems/1/annotator/counts"]);

        net.respond(0, r#"[{"block_id": "/ol[1]/li[2]", "num_annotations_in_block": 3},
                           {"block_id": "/table[1]", "num_annotations_in_block": 1}]"#);
        let Ok(Message::Counts(counts)) = receiver.try_recv() else {
            panic!("expected counts");
        };
        counters.apply_counts(&mut doc, counts);

        let badges: Vec<_> = counters.badges().map(|(id, block)| (id, block.to_string())).collect();
        assert_eq!(badges.len(), 1);
        let (badge, block) = &badges[0];
        assert_eq!(block, "/ol[1]/li[2]");
        assert_eq!(doc.text_content(*badge), "3");
        assert_eq!(doc.tree()[*badge].attr("style"), Some("top: 120px"));
        assert!(doc.tree()[counters.container()].has_class("annotator-counts"));

        let click = DomEvent::new(
            *badge,
            DomEventData::Click(MouseButtonEvent::new(0.0, 120.0)),
            doc.node_chain(*badge),
        );
        counters.handle_event(&mut doc, &click);
        assert_eq!(
            net.urls()[1],
            "https://example.org/poems/1/annotator/get/ol[1]li[2]"
        );

        net.respond(1, r#"[{"id": 4, "text": "note", "ranges": []}]"#);
        let Ok(Message::BlockAnnotations { block_id, annotations }) = receiver.try_recv() else {
            panic!("expected block annotations");
        };
        assert_eq!(block_id, "/ol[1]/li[2]");
        assert_eq!(annotations[0].text, "note");
    }

    #[test]
    fn relative_urls_need_a_base() {
        let mut doc = parse("<p>one</p>");
        let body = doc.body().unwrap();
        let (sender, _receiver) = channel();
        assert!(matches!(
            BlockCounters::new(&mut doc, BlockCounterConfig::default(), body, body, sender),
            Err(ComponentError::InvalidUrl(_))
        ));
    }
}
