use bitflags::bitflags;
use keyboard_types::{Code, Key, Location, Modifiers};
use smol_str::SmolStr;

use crate::Viewport;

/// A window-level input event, before it has been hit-tested against the document.
#[derive(Debug, Clone)]
pub enum UiEvent {
    MouseMove(MouseButtonEvent),
    MouseDown(MouseButtonEvent),
    MouseUp(MouseButtonEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// The window was resized. Layout boxes are expected to have been updated by the host.
    Resize(Viewport),
}

#[derive(Debug, Clone)]
pub struct DomEvent {
    pub target: usize,
    /// Which is true if the event bubbles up through the DOM tree.
    pub bubbles: bool,
    /// which is true if the event can be canceled.
    pub cancelable: bool,
    pub current_target: Option<usize>,
    composed_path: Vec<usize>,
    /// Where true indicates that the default user agent action was prevented,
    /// and false indicates that it was not.
    pub default_prevented: bool,

    pub stop_propagation: bool,
    pub data: DomEventData,
}

impl DomEvent {
    pub fn new(target: usize, data: DomEventData, composed_path: Vec<usize>) -> Self {
        let cancelable = !matches!(data, DomEventData::Event("resize"));
        Self {
            target,
            bubbles: true,
            cancelable,
            current_target: None,
            composed_path,
            default_prevented: false,

            stop_propagation: false,
            data,
        }
    }

    /// The target followed by its ancestors, innermost first.
    pub fn composed_path(&self) -> &[usize] {
        &self.composed_path
    }

    pub fn prevent_default(&mut self) {
        if !self.cancelable {
            return;
        }
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.stop_propagation = true;
    }

    /// Returns the name of the event ("click", "mousedown", "keydown", etc)
    pub fn name(&self) -> &'static str {
        self.data.name()
    }
}

#[derive(Debug, Clone)]
pub enum DomEventData {
    MouseDown(MouseButtonEvent),
    MouseUp(MouseButtonEvent),
    Click(MouseButtonEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// A string containing the type of Event.
    Event(&'static str),
}

impl DomEventData {
    pub fn name(&self) -> &'static str {
        match self {
            DomEventData::MouseDown { .. } => "mousedown",
            DomEventData::MouseUp { .. } => "mouseup",
            DomEventData::Click { .. } => "click",
            DomEventData::KeyDown { .. } => "keydown",
            DomEventData::KeyUp { .. } => "keyup",
            DomEventData::Event(event_type) => event_type,
        }
    }

    pub fn mouse(&self) -> Option<&MouseButtonEvent> {
        match self {
            DomEventData::MouseDown(ev) | DomEventData::MouseUp(ev) | DomEventData::Click(ev) => {
                Some(ev)
            }
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&KeyEvent> {
        match self {
            DomEventData::KeyDown(ev) | DomEventData::KeyUp(ev) => Some(ev),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseEventButton {
    #[default]
    Main = 0,
    Auxiliary = 1,
    Secondary = 2,
    Fourth = 3,
    Fifth = 4,
}

bitflags! {
    /// The set of buttons held down while the event fired
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MouseEventButtons: u8 {
        const None = 0b0000_0000;
        const Primary = 0b0000_0001;
        const Secondary = 0b0000_0010;
        const Auxiliary = 0b0000_0100;
        const Fourth = 0b0000_1000;
        const Fifth = 0b0001_0000;
    }
}

impl From<MouseEventButton> for MouseEventButtons {
    fn from(value: MouseEventButton) -> Self {
        match value {
            MouseEventButton::Main => Self::Primary,
            MouseEventButton::Auxiliary => Self::Auxiliary,
            MouseEventButton::Secondary => Self::Secondary,
            MouseEventButton::Fourth => Self::Fourth,
            MouseEventButton::Fifth => Self::Fifth,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MouseButtonEvent {
    /// Page x coordinate
    pub x: f32,
    /// Page y coordinate
    pub y: f32,
    /// x coordinate relative to the target's border box (filled in by hit testing)
    pub offset_x: f32,
    /// y coordinate relative to the target's border box (filled in by hit testing)
    pub offset_y: f32,
    pub button: MouseEventButton,
    pub buttons: MouseEventButtons,
    pub mods: Modifiers,
}

impl MouseButtonEvent {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn is_primary(&self) -> bool {
        self.button == MouseEventButton::Main
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

impl KeyState {
    pub fn is_pressed(self) -> bool {
        matches!(self, Self::Pressed)
    }
}

#[derive(Clone, Debug)]
pub struct KeyEvent {
    pub key: Key,
    pub code: Code,
    pub modifiers: Modifiers,
    pub location: Location,
    pub is_auto_repeating: bool,
    pub is_composing: bool,
    pub state: KeyState,
    pub text: Option<SmolStr>,
}

impl KeyEvent {
    /// A plain key press with no modifiers
    pub fn pressed(key: Key, code: Code) -> Self {
        Self {
            key,
            code,
            modifiers: Modifiers::empty(),
            location: Location::Standard,
            is_auto_repeating: false,
            is_composing: false,
            state: KeyState::Pressed,
            text: None,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
