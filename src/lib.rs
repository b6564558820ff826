pub mod bootstrap;
pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod task;
pub mod tui;
