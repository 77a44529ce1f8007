//! Session orchestration: lifecycle, event loop, and the UI-facing surface.

mod controller;

pub use controller::{SessionController, SessionLifecycle, UiEvent};
