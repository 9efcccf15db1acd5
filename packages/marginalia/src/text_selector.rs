//! Turns pointer-driven text selections into selection notifications.

use marginalia_dom::{BaseDocument, LiveRange};
use marginalia_traits::{DomEvent, DomEventData, MouseButtonEvent};

use crate::chrome;
use crate::range::{self, NormalizedRange, RangeError};
use crate::signal::Signal;

/// The pointer events that ended (and started) a selection
#[derive(Debug, Clone, Default)]
pub struct PointerInfo {
    /// The event that completed the selection
    pub event: MouseButtonEvent,
    /// The mousedown that started it, if one was seen inside the root
    pub start_of_selection: Option<MouseButtonEvent>,
}

#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    Selected {
        ranges: Vec<NormalizedRange>,
        pointer: PointerInfo,
    },
    Deselected {
        pointer: PointerInfo,
    },
}

impl From<SelectionOutcome> for Signal {
    fn from(outcome: SelectionOutcome) -> Self {
        match outcome {
            SelectionOutcome::Selected { ranges, pointer } => Signal::TextSelected { ranges, pointer },
            SelectionOutcome::Deselected { pointer } => Signal::TextDeselected { pointer },
        }
    }
}

#[derive(Debug, Clone, Default)]
enum SelectorState {
    #[default]
    Idle,
    Selecting {
        down: MouseButtonEvent,
    },
}

pub struct TextSelector {
    root: usize,
    state: SelectorState,
    /// Classes of elements that look like chrome but wrap document text
    highlight_classes: Vec<String>,
}

impl TextSelector {
    pub fn new(root: usize, highlight_classes: Vec<String>) -> Self {
        Self {
            root,
            state: SelectorState::Idle,
            highlight_classes,
        }
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
        self.state = SelectorState::Idle;
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, SelectorState::Selecting { .. })
    }

    fn skip_classes(&self) -> Vec<&str> {
        self.highlight_classes.iter().map(String::as_str).collect()
    }

    /// React to a mouse event. Events outside the root or inside annotator chrome are
    /// ignored.
    pub fn handle_event(
        &mut self,
        doc: &mut BaseDocument,
        event: &DomEvent,
    ) -> Option<SelectionOutcome> {
        if !event.composed_path().contains(&self.root)
            || chrome::is_chrome(doc, event.target, &self.skip_classes())
        {
            return None;
        }

        match &event.data {
            DomEventData::MouseDown(mouse) if mouse.is_primary() => {
                self.state = SelectorState::Selecting { down: mouse.clone() };
                None
            }
            DomEventData::MouseUp(mouse) if mouse.is_primary() => {
                let down = match std::mem::take(&mut self.state) {
                    SelectorState::Selecting { down } => Some(down),
                    SelectorState::Idle => None,
                };
                Some(self.capture(doc, mouse.clone(), down))
            }
            _ => None,
        }
    }

    /// Inspect the document's native selection after a selection gesture ended.
    pub fn capture(
        &mut self,
        doc: &mut BaseDocument,
        event: MouseButtonEvent,
        start_of_selection: Option<MouseButtonEvent>,
    ) -> SelectionOutcome {
        let pointer = PointerInfo {
            event,
            start_of_selection,
        };

        let selection = doc.selection().clone();
        if selection.is_collapsed() {
            return SelectionOutcome::Deselected { pointer };
        }

        // Normalizing mutates the DOM, so the native selection is rebuilt as we go
        doc.selection_mut().remove_all_ranges();
        let mut ranges = Vec::with_capacity(selection.range_count());
        let mut outside: Vec<LiveRange> = Vec::new();
        for raw in selection.ranges().iter().filter(|raw| !raw.is_collapsed()) {
            match range::normalize(doc, raw, self.root) {
                Ok(range) => ranges.push(range),
                Err(RangeError::OutsideRoot) => outside.push(*raw),
                Err(err) => tracing::trace!(%err, "ignoring selection range"),
            }
        }
        for raw in outside {
            doc.selection_mut().add_range(raw);
        }
        for range in &ranges {
            let live = range.to_live_range(doc);
            doc.selection_mut().add_range(live);
        }

        if ranges.is_empty() {
            return SelectionOutcome::Deselected { pointer };
        }

        if let [only] = ranges.as_slice() {
            let whitespace = only.start == only.end
                && doc
                    .get_node(only.start)
                    .and_then(|node| node.text_data())
                    .is_none_or(|text| text.is_whitespace());
            if whitespace {
                return SelectionOutcome::Deselected { pointer };
            }
        }

        let skip = self.skip_classes();
        if ranges
            .iter()
            .any(|range| chrome::is_chrome(doc, range.common_ancestor, &skip))
        {
            return SelectionOutcome::Deselected { pointer };
        }

        SelectionOutcome::Selected { ranges, pointer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::parse;
    use marginalia_dom::Boundary;
    use marginalia_traits::MouseEventButton;

    fn selector(doc: &BaseDocument) -> TextSelector {
        TextSelector::new(
            doc.body().unwrap(),
            vec!["annotator-hl".into(), "annotator-hl-temporary".into()],
        )
    }

    fn mouse_event(doc: &BaseDocument, target: usize, data: DomEventData) -> DomEvent {
        DomEvent::new(target, data, doc.node_chain(target))
    }

    #[test]
    fn selecting_text_produces_normalized_ranges() {
        let mut doc = parse("<p>Hello world</p>");
        let mut selector = selector(&doc);
        let p = doc.first_element_with_tag(0, "p").unwrap();
        let text = doc.text_nodes_in(p)[0];

        let down = mouse_event(&doc, p, DomEventData::MouseDown(MouseButtonEvent::new(10.0, 5.0)));
        assert!(selector.handle_event(&mut doc, &down).is_none());
        assert!(selector.is_selecting());

        doc.set_selection(LiveRange::new(Boundary::new(text, 6), Boundary::new(text, 11)));
        let up = mouse_event(&doc, p, DomEventData::MouseUp(MouseButtonEvent::new(60.0, 5.0)));
        let Some(SelectionOutcome::Selected { ranges, pointer }) = selector.handle_event(&mut doc, &up)
        else {
            panic!("expected a selection");
        };

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].text(&doc), "world");
        assert_eq!(pointer.start_of_selection.map(|down| down.x), Some(10.0));
        assert_eq!(doc.selection().get_range_at(0).unwrap().text(&doc), "world");
    }

    #[test]
    fn secondary_button_release_is_ignored() {
        let mut doc = parse("<p>Hello world</p>");
        let mut selector = selector(&doc);
        let p = doc.first_element_with_tag(0, "p").unwrap();
        let text = doc.text_nodes_in(p)[0];
        doc.set_selection(LiveRange::new(Boundary::new(text, 6), Boundary::new(text, 11)));

        let mut right = MouseButtonEvent::new(60.0, 5.0);
        right.button = MouseEventButton::Secondary;

        let up = mouse_event(&doc, p, DomEventData::MouseUp(right.clone()));
        assert!(selector.handle_event(&mut doc, &up).is_none());

        // A context click mid-gesture neither finishes nor cancels the selection
        let down = mouse_event(&doc, p, DomEventData::MouseDown(MouseButtonEvent::new(10.0, 5.0)));
        assert!(selector.handle_event(&mut doc, &down).is_none());
        let up = mouse_event(&doc, p, DomEventData::MouseUp(right));
        assert!(selector.handle_event(&mut doc, &up).is_none());
        assert!(selector.is_selecting());
        assert_eq!(doc.selection().get_range_at(0).unwrap().text(&doc), "world");
    }

    #[test]
    fn collapsed_and_whitespace_selections_deselect() {
        let mut doc = parse("<p>Hello   world</p>");
        let mut selector = selector(&doc);
        let text = doc.text_nodes_in(doc.body().unwrap())[0];

        let outcome = selector.capture(&mut doc, MouseButtonEvent::new(0.0, 0.0), None);
        assert!(matches!(outcome, SelectionOutcome::Deselected { .. }));

        doc.set_selection(LiveRange::new(Boundary::new(text, 5), Boundary::new(text, 8)));
        let outcome = selector.capture(&mut doc, MouseButtonEvent::new(0.0, 0.0), None);
        assert!(matches!(outcome, SelectionOutcome::Deselected { .. }));
    }

    #[test]
    fn selections_inside_chrome_deselect() {
        let mut doc = parse("<div class=\"annotator-viewer\"><p>note text</p></div>");
        let mut selector = selector(&doc);
        let text = doc.text_nodes_in(doc.body().unwrap())[0];

        doc.set_selection(LiveRange::new(Boundary::new(text, 0), Boundary::new(text, 4)));
        let outcome = selector.capture(&mut doc, MouseButtonEvent::new(0.0, 0.0), None);
        assert!(matches!(outcome, SelectionOutcome::Deselected { .. }));
    }

    #[test]
    fn events_on_chrome_are_ignored() {
        let mut doc = parse("<div class=\"annotator-editor\"><textarea></textarea></div>");
        let mut selector = selector(&doc);
        let textarea = doc.first_element_with_tag(0, "textarea").unwrap();

        let up = mouse_event(&doc, textarea, DomEventData::MouseUp(MouseButtonEvent::new(0.0, 0.0)));
        assert!(selector.handle_event(&mut doc, &up).is_none());
    }

    #[test]
    fn ranges_outside_the_root_stay_selected() {
        let mut doc = parse("<div id=\"other\">elsewhere</div><div id=\"root\">here</div>");
        let root = doc.get_element_by_id("root").unwrap();
        let other = doc.get_element_by_id("other").unwrap();
        let mut selector = TextSelector::new(root, Vec::new());
        let text = doc.text_nodes_in(other)[0];

        let raw = LiveRange::new(Boundary::new(text, 0), Boundary::new(text, 4));
        doc.set_selection(raw);
        let outcome = selector.capture(&mut doc, MouseButtonEvent::new(0.0, 0.0), None);

        assert!(matches!(outcome, SelectionOutcome::Deselected { .. }));
        assert_eq!(doc.selection().ranges(), &[raw]);
    }
}
