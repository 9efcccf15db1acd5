//! Shared types and traits for the marginalia crates.
//!
//! The DOM crate, the networking crate and the annotation UI all speak in terms of the
//! types defined here, so that a host (shell, renderer or test harness) can drive the
//! annotation UI without depending on any particular backend.

pub mod net;

pub mod shell;

mod events;
pub use events::{
    DomEvent, DomEventData, KeyEvent, KeyState, MouseButtonEvent, MouseEventButton,
    MouseEventButtons, UiEvent,
};

mod viewport;
pub use viewport::Viewport;
