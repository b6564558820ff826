use crate::error::{LocateError, SupervisorError, TaskError};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TASK: &str = r#"{"speed_flip": 10, "ball_hunt": 10, "shooting": 50}"#;

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub results_dir: PathBuf,
    pub prefix: String,
    pub interpreter: String,
    pub script: PathBuf,
    pub initial_task: String,
    /// Append `--task <json>` to the invocation.
    pub forward_task: bool,
    /// Relaunch immediately after a configuration edit cancels a run.
    pub relaunch_on_edit: bool,
    pub retry_interval: Option<Duration>,
    pub start_looping: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("ray_results"),
            prefix: "checkpoint_".into(),
            interpreter: "python".into(),
            script: PathBuf::from("run_inference.py"),
            initial_task: DEFAULT_TASK.into(),
            forward_task: false,
            relaunch_on_edit: false,
            retry_interval: Some(Duration::from_secs(5)),
            start_looping: true,
        }
    }
}

/// Coarse supervisory state, derived from the supervisor's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No checkpoint known yet.
    Idle,
    /// Looping with a known checkpoint and nothing in flight: a scan is
    /// outstanding, or the last rescan failed and a retry is pending.
    AwaitingArtifact,
    Running,
    /// A cancellation was issued and the run has not reported back yet.
    Cancelling,
    Paused,
}

/// Terminal result of one external task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(TaskError),
    Cancelled,
}

/// Results posted back into the controller loop by background work.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ScanFinished {
        generation: u64,
        result: Result<PathBuf, LocateError>,
    },
    TaskFinished {
        generation: u64,
        outcome: TaskOutcome,
    },
}

/// Terminal-independent key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Esc,
    /// Ctrl-C, always quits.
    Interrupt,
}

/// Read-only projection of the supervisor handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: Phase,
    pub looping: bool,
    pub checkpoint: Option<PathBuf>,
    pub editor_text: String,
    pub editor_cursor: usize,
    pub editing: bool,
    pub last_error: Option<SupervisorError>,
    pub info: Option<String>,
    pub cycles: u64,
    pub last_cycle_at: Option<String>,
}
