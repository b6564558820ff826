//! Application-level orchestration.
//!
//! The supervisor decides; the controller executes. UI layers only send key
//! input in and render the snapshots that come back out.

mod controller;
mod supervisor;

pub use controller::{run_controller, UiCommand, UiUpdate};
pub use supervisor::{Effect, Supervisor};
