//! Session module
//!
//! Explicit session state plus the controller that orchestrates commands
//! from the UI, audio layer and input gestures.

pub mod controller;
pub mod state;

pub use controller::SessionController;
pub use state::{Countdown, RowView, SessionEvent, SessionSnapshot, SessionState};
