//! Error types surfaced to the operator.
//!
//! None of these are fatal: the supervisor stores the most recent one in its
//! single "last error" slot and keeps accepting input.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of a checkpoint scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("directory '{}' not found. Please run this from your project root", .0.display())]
    NotFound(PathBuf),
    #[error("no checkpoint directories found in '{}'", .0.display())]
    NoMatch(PathBuf),
    #[error("error walking directory: {0}")]
    Traversal(String),
}

/// Failures of an external task run. Cancellation is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("failed to launch '{program}': {message}")]
    Launch { program: String, message: String },
    #[error("script error: {status}")]
    NonZeroExit { status: String, output: String },
}

impl TaskError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Combined stdout/stderr of the process, empty when it never started.
    pub fn output(&self) -> &str {
        match self {
            TaskError::Launch { .. } => "",
            TaskError::NonZeroExit { output, .. } => output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid JSON format for task: {0}")]
    InvalidJson(String),
}

/// Anything that can occupy the supervisor's last-error slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SupervisorError {
    pub fn is_locate(&self) -> bool {
        matches!(self, SupervisorError::Locate(_))
    }
}
