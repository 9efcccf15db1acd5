use marginalia_traits::{DomEvent, DomEventData, MouseButtonEvent, UiEvent};

use crate::BaseDocument;

/// The result of hit testing a point against the document's layout boxes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// The element that was hit
    pub node_id: usize,
    /// The x coordinate of the hit relative to the element's border box
    pub x: f32,
    /// The y coordinate of the hit relative to the element's border box
    pub y: f32,
}

impl BaseDocument {
    /// Find the deepest element whose border box contains the page point `(x, y)`.
    ///
    /// Elements without a layout box (zero sized) are transparent: their children are still
    /// tested, but they are never returned themselves. Later siblings win over earlier ones.
    pub fn hit(&self, x: f32, y: f32) -> Option<HitResult> {
        let root = self.root_element()?.id;
        self.hit_node(root, x as f64, y as f64)
    }

    fn hit_node(&self, node_id: usize, x: f64, y: f64) -> Option<HitResult> {
        let node = self.get_node(node_id)?;
        if !node.is_element() {
            return None;
        }

        let rect = node.final_layout;
        let x = x - rect.x0;
        let y = y - rect.y0;

        let has_box = rect.width() > 0.0 && rect.height() > 0.0;
        let matches_self = has_box && x >= 0.0 && y >= 0.0 && x <= rect.width() && y <= rect.height();

        for child_id in node.children.iter().rev() {
            if let Some(hit) = self.hit_node(*child_id, x, y) {
                return Some(hit);
            }
        }

        matches_self.then_some(HitResult {
            node_id,
            x: x as f32,
            y: y as f32,
        })
    }

    /// Convert a window-level event into the DOM events it causes.
    ///
    /// Pointer events are hit tested. A mouseup on the same element that received the
    /// mousedown additionally produces a `click`. Keyboard events target the focussed
    /// node, falling back to the document element.
    pub fn ui_to_dom_events(&mut self, event: UiEvent) -> Vec<DomEvent> {
        let fallback_target = self.root_element().map(|node| node.id).unwrap_or(0);

        match event {
            UiEvent::MouseMove(_) => Vec::new(),
            UiEvent::MouseDown(mouse) => {
                let (target, mouse) = self.target_mouse_event(mouse, fallback_target);
                self.mousedown_node_id = Some(target);
                vec![self.dom_event(target, DomEventData::MouseDown(mouse))]
            }
            UiEvent::MouseUp(mouse) => {
                let (target, mouse) = self.target_mouse_event(mouse, fallback_target);
                let mut events = vec![self.dom_event(target, DomEventData::MouseUp(mouse.clone()))];
                if self.mousedown_node_id.take() == Some(target) {
                    events.push(self.dom_event(target, DomEventData::Click(mouse)));
                }
                events
            }
            UiEvent::KeyDown(key) => {
                let target = self.get_focussed_node_id().unwrap_or(fallback_target);
                vec![self.dom_event(target, DomEventData::KeyDown(key))]
            }
            UiEvent::KeyUp(key) => {
                let target = self.get_focussed_node_id().unwrap_or(fallback_target);
                vec![self.dom_event(target, DomEventData::KeyUp(key))]
            }
            UiEvent::Resize(viewport) => {
                self.set_viewport(viewport);
                vec![self.dom_event(fallback_target, DomEventData::Event("resize"))]
            }
        }
    }

    fn target_mouse_event(
        &self,
        mut mouse: MouseButtonEvent,
        fallback_target: usize,
    ) -> (usize, MouseButtonEvent) {
        match self.hit(mouse.x, mouse.y) {
            Some(hit) => {
                mouse.offset_x = hit.x;
                mouse.offset_y = hit.y;
                (hit.node_id, mouse)
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::trace!(x = mouse.x, y = mouse.y, "pointer event missed every layout box");
                (fallback_target, mouse)
            }
        }
    }

    fn dom_event(&self, target: usize, data: DomEventData) -> DomEvent {
        DomEvent::new(target, data, self.node_chain(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentConfig;
    use crate::util::html_name;
    use kurbo::Rect;

    fn laid_out_doc() -> (BaseDocument, usize, usize, usize) {
        let mut doc = BaseDocument::new(DocumentConfig::default());
        let mut m = doc.mutate();
        let html = m.create_element(html_name("html"), Vec::new());
        let p = m.create_element(html_name("p"), Vec::new());
        let a = m.create_element(html_name("a"), Vec::new());
        m.append_children(0, &[html]);
        m.append_children(html, &[p]);
        m.append_children(p, &[a]);
        m.set_layout(html, Rect::new(0.0, 0.0, 800.0, 600.0));
        m.set_layout(p, Rect::new(10.0, 100.0, 410.0, 140.0));
        m.set_layout(a, Rect::new(20.0, 5.0, 60.0, 25.0));
        drop(m);
        (doc, html, p, a)
    }

    #[test]
    fn hit_finds_deepest_box() {
        let (doc, html, p, a) = laid_out_doc();
        let hit = doc.hit(35.0, 110.0).unwrap();
        assert_eq!(hit.node_id, a);
        assert_eq!((hit.x, hit.y), (5.0, 5.0));
        assert_eq!(doc.hit(300.0, 120.0).unwrap().node_id, p);
        assert_eq!(doc.hit(700.0, 500.0).unwrap().node_id, html);
    }

    #[test]
    fn mouseup_on_mousedown_target_synthesizes_click() {
        let (mut doc, _, p, a) = laid_out_doc();
        doc.ui_to_dom_events(UiEvent::MouseDown(MouseButtonEvent::new(35.0, 110.0)));
        let events = doc.ui_to_dom_events(UiEvent::MouseUp(MouseButtonEvent::new(36.0, 111.0)));
        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["mouseup", "click"]);
        assert_eq!(events[1].target, a);
        assert_eq!(events[1].composed_path()[1], p);

        doc.ui_to_dom_events(UiEvent::MouseDown(MouseButtonEvent::new(35.0, 110.0)));
        let events = doc.ui_to_dom_events(UiEvent::MouseUp(MouseButtonEvent::new(300.0, 120.0)));
        assert_eq!(events.len(), 1);
    }
}
