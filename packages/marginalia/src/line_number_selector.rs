//! Whole-line selection for numbered documents such as poems.
//!
//! Each line is an `<li>` of an `<ol>`; its number is drawn in the gutter to the left of
//! the line box. Clicking the number (with the configured modifier held) selects the
//! entire line as if the user had dragged across it.

use keyboard_types::Modifiers;
use marginalia_dom::{BaseDocument, Boundary, LiveRange};
use marginalia_traits::{DomEvent, DomEventData, MouseButtonEvent};
use serde::{Deserialize, Serialize};

use crate::range;
use crate::text_selector::{PointerInfo, SelectionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    Alt,
    Ctrl,
    Meta,
    Shift,
}

impl ModifierKey {
    pub fn is_held(self, modifiers: Modifiers) -> bool {
        let flag = match self {
            Self::Alt => Modifiers::ALT,
            Self::Ctrl => Modifiers::CONTROL,
            Self::Meta => Modifiers::META,
            Self::Shift => Modifiers::SHIFT,
        };
        modifiers.contains(flag)
    }
}

/// Horizontal extent of the clickable gutter, in em relative to the line's left edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickRange {
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineNumberConfig {
    pub line_tag: String,
    pub parent_tag: String,
    pub click_range: ClickRange,
    /// Height of one line (and size of one em) in px
    pub line_height: f64,
    /// Modifier that must be held; any click counts when `None`
    pub modifier: Option<ModifierKey>,
}

impl Default for LineNumberConfig {
    fn default() -> Self {
        Self {
            line_tag: "li".to_string(),
            parent_tag: "ol".to_string(),
            click_range: ClickRange {
                left: -2.0,
                right: -0.05,
            },
            line_height: 16.0,
            modifier: None,
        }
    }
}

pub struct LineNumberSelector {
    config: LineNumberConfig,
    root: usize,
}

impl LineNumberSelector {
    pub fn new(config: LineNumberConfig, root: usize) -> Self {
        Self { config, root }
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
    }

    fn lines(&self, doc: &BaseDocument) -> Vec<usize> {
        marginalia_dom::TreeTraverser::new_with_root(doc, self.root)
            .filter(|id| {
                let node = &doc.tree()[*id];
                node.is_element_with_tag_name(&self.config.line_tag)
                    && node
                        .parent
                        .is_some_and(|parent| doc.tree()[parent].is_element_with_tag_name(&self.config.parent_tag))
            })
            .collect()
    }

    /// The line whose gutter contains the page point of `mouse`
    pub fn line_at(&self, doc: &BaseDocument, mouse: &MouseButtonEvent) -> Option<usize> {
        let em = self.config.line_height;
        let ClickRange { left, right } = self.config.click_range;
        self.lines(doc).into_iter().find(|line| {
            let origin = doc.absolute_position(*line);
            let dx = f64::from(mouse.x) - origin.x;
            let dy = f64::from(mouse.y) - origin.y;
            left * em < dx && dx < right * em && 0.0 < dy && dy < em
        })
    }

    pub fn handle_event(
        &mut self,
        doc: &mut BaseDocument,
        event: &DomEvent,
    ) -> Option<SelectionOutcome> {
        let DomEventData::Click(mouse) = &event.data else {
            return None;
        };
        if self.config.modifier.is_some_and(|key| !key.is_held(mouse.mods)) {
            return None;
        }
        let line = self.line_at(doc, mouse)?;
        self.select_line(doc, line, mouse.clone())
    }

    /// Select the whole of `line`, replacing the native selection
    pub fn select_line(
        &mut self,
        doc: &mut BaseDocument,
        line: usize,
        event: MouseButtonEvent,
    ) -> Option<SelectionOutcome> {
        let texts = doc.text_nodes_in(line);
        let (first, last) = (*texts.first()?, *texts.last()?);
        let raw = LiveRange::new(
            Boundary::new(first, 0),
            Boundary::new(last, doc.tree()[last].text_len()),
        );

        let normed = match range::normalize(doc, &raw, self.root) {
            Ok(normed) => normed,
            Err(err) => {
                tracing::debug!(%err, line, "couldn't select line");
                return None;
            }
        };
        let live = normed.to_live_range(doc);
        doc.set_selection(live);

        Some(SelectionOutcome::Selected {
            ranges: vec![normed],
            pointer: PointerInfo {
                event,
                start_of_selection: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::parse;
    use kurbo::Rect;

    fn poem() -> (BaseDocument, usize) {
        let mut doc = parse("<ol><li>Shall I compare thee</li><li>to a <em>summer's</em> day?</li></ol>");
        let body = doc.body().unwrap();
        let ol = doc.first_element_with_tag(body, "ol").unwrap();
        let lines: Vec<usize> = doc.element_children(ol).map(|node| node.id).collect();
        let mut m = doc.mutate();
        m.set_layout(ol, Rect::new(40.0, 0.0, 540.0, 32.0));
        m.set_layout(lines[0], Rect::new(0.0, 0.0, 500.0, 16.0));
        m.set_layout(lines[1], Rect::new(0.0, 16.0, 500.0, 32.0));
        drop(m);
        (doc, ol)
    }

    fn click_at(doc: &BaseDocument, target: usize, x: f32, y: f32, mods: Modifiers) -> DomEvent {
        let mut mouse = MouseButtonEvent::new(x, y);
        mouse.mods = mods;
        DomEvent::new(target, DomEventData::Click(mouse), doc.node_chain(target))
    }

    #[test]
    fn gutter_click_selects_the_line() {
        let (mut doc, ol) = poem();
        let mut selector = LineNumberSelector::new(LineNumberConfig::default(), doc.body().unwrap());

        let click = click_at(&doc, ol, 25.0, 20.0, Modifiers::empty());
        let Some(SelectionOutcome::Selected { ranges, pointer }) = selector.handle_event(&mut doc, &click)
        else {
            panic!("expected the second line to be selected");
        };
        assert_eq!(ranges[0].text(&doc), "to a summer's day?");
        assert_eq!(pointer.event.y, 20.0);
        assert_eq!(doc.selection().get_range_at(0).unwrap().text(&doc), "to a summer's day?");
    }

    #[test]
    fn clicks_outside_the_gutter_are_ignored() {
        let (mut doc, ol) = poem();
        let mut selector = LineNumberSelector::new(LineNumberConfig::default(), doc.body().unwrap());

        // Inside the line box itself
        let click = click_at(&doc, ol, 60.0, 4.0, Modifiers::empty());
        assert!(selector.handle_event(&mut doc, &click).is_none());
        // Too far left
        let click = click_at(&doc, ol, 2.0, 4.0, Modifiers::empty());
        assert!(selector.handle_event(&mut doc, &click).is_none());
    }

    #[test]
    fn configured_modifier_is_required() {
        let (mut doc, ol) = poem();
        let config = LineNumberConfig {
            modifier: Some(ModifierKey::Alt),
            ..Default::default()
        };
        let mut selector = LineNumberSelector::new(config, doc.body().unwrap());

        let plain = click_at(&doc, ol, 25.0, 4.0, Modifiers::empty());
        assert!(selector.handle_event(&mut doc, &plain).is_none());
        let with_alt = click_at(&doc, ol, 25.0, 4.0, Modifiers::ALT);
        assert!(selector.handle_event(&mut doc, &with_alt).is_some());
    }
}
