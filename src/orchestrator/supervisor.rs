//! Supervisory state machine.
//!
//! The supervisor is the only mutator of looping/checkpoint/task state. It
//! consumes discrete events (keys, scan results, task outcomes, timer ticks)
//! and answers with `Effect`s for the controller to execute. It never blocks
//! and never performs I/O itself; the one side effect it owns is firing the
//! in-flight run's cancellation token.

use crate::error::{ConfigError, SupervisorError};
use crate::model::{EngineEvent, KeyInput, Phase, Snapshot, TaskOutcome, WatchConfig};
use crate::task::{TaskConfig, TaskEditor};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a cancellation may stay unresolved before the operator is told.
const CANCEL_NOTICE_AFTER: Duration = Duration::from_secs(3);

/// Work the controller must start on the supervisor's behalf.
#[derive(Debug)]
pub enum Effect {
    Scan {
        generation: u64,
    },
    Launch {
        generation: u64,
        checkpoint: PathBuf,
        task: TaskConfig,
        cancel: CancellationToken,
    },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelReason {
    Pause,
    Reconfigure,
    Quit,
}

/// Handle for the single run that may be in flight.
#[derive(Debug)]
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    cancel_reason: Option<CancelReason>,
    cancel_deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct Supervisor {
    looping: bool,
    checkpoint: Option<PathBuf>,
    task: TaskConfig,
    editor: TaskEditor,
    in_flight: Option<InFlight>,
    pending_scan: Option<u64>,
    scan_generation: u64,
    task_generation: u64,
    relaunch_pending: bool,
    relaunch_on_edit: bool,
    last_error: Option<SupervisorError>,
    info: Option<String>,
    cycles: u64,
    last_cycle_at: Option<String>,
    quitting: bool,
}

impl Supervisor {
    pub fn new(cfg: &WatchConfig) -> Result<Self, ConfigError> {
        let task = TaskConfig::parse(&cfg.initial_task)?;
        Ok(Self {
            looping: cfg.start_looping,
            checkpoint: None,
            editor: TaskEditor::new(task.as_str()),
            task,
            in_flight: None,
            pending_scan: None,
            scan_generation: 0,
            task_generation: 0,
            relaunch_pending: false,
            relaunch_on_edit: cfg.relaunch_on_edit,
            last_error: None,
            info: None,
            cycles: 0,
            last_cycle_at: None,
            quitting: false,
        })
    }

    /// Startup: look for the first checkpoint.
    pub fn start(&mut self) -> Vec<Effect> {
        vec![self.request_scan()]
    }

    pub fn phase(&self) -> Phase {
        match &self.in_flight {
            Some(f) if f.cancel_reason.is_some() => Phase::Cancelling,
            Some(_) => Phase::Running,
            None if self.checkpoint.is_none() => Phase::Idle,
            None if !self.looping => Phase::Paused,
            None => Phase::AwaitingArtifact,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase(),
            looping: self.looping,
            checkpoint: self.checkpoint.clone(),
            editor_text: self.editor.text(),
            editor_cursor: self.editor.cursor(),
            editing: self.editor.is_focused(),
            last_error: self.last_error.clone(),
            info: self.info.clone(),
            cycles: self.cycles,
            last_cycle_at: self.last_cycle_at.clone(),
        }
    }

    pub fn handle_key(&mut self, key: KeyInput) -> Vec<Effect> {
        if key == KeyInput::Interrupt {
            return self.quit();
        }

        if self.editor.is_focused() {
            match key {
                KeyInput::Enter => return self.submit_task(),
                KeyInput::Esc => {
                    self.editor.set_text(self.task.as_str());
                    self.editor.blur();
                    if matches!(self.last_error, Some(SupervisorError::Config(_))) {
                        self.last_error = None;
                    }
                }
                KeyInput::Char(c) => self.editor.insert(c),
                KeyInput::Backspace => self.editor.backspace(),
                KeyInput::Delete => self.editor.delete(),
                KeyInput::Left => self.editor.left(),
                KeyInput::Right => self.editor.right(),
                KeyInput::Home => self.editor.home(),
                KeyInput::End => self.editor.end(),
                KeyInput::Interrupt => {}
            }
            return Vec::new();
        }

        match key {
            KeyInput::Char('q') => self.quit(),
            KeyInput::Char(' ') => self.toggle_looping(),
            KeyInput::Char('e') => {
                self.editor.focus();
                self.last_error = None;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn handle_engine(&mut self, event: EngineEvent) -> Vec<Effect> {
        match event {
            EngineEvent::ScanFinished { generation, result } => {
                if self.pending_scan != Some(generation) {
                    debug!(generation, "discarding stale scan result");
                    return Vec::new();
                }
                self.pending_scan = None;
                match result {
                    Ok(path) => {
                        if self.last_error.as_ref().is_some_and(SupervisorError::is_locate) {
                            self.last_error = None;
                        }
                        debug!(checkpoint = %path.display(), "scan found checkpoint");
                        self.checkpoint = Some(path);
                        if self.looping && !self.quitting {
                            return self.launch().into_iter().collect();
                        }
                        Vec::new()
                    }
                    Err(e) => {
                        warn!(error = %e, "checkpoint scan failed");
                        self.last_error = Some(e.into());
                        Vec::new()
                    }
                }
            }
            EngineEvent::TaskFinished {
                generation,
                outcome,
            } => self.task_finished(generation, outcome),
        }
    }

    /// Periodic retry: only re-scans after a failed scan left the loop stuck.
    pub fn retry_due(&mut self) -> Vec<Effect> {
        let stuck = self.looping
            && !self.quitting
            && self.in_flight.is_none()
            && self.pending_scan.is_none()
            && self.last_error.as_ref().is_some_and(SupervisorError::is_locate);
        if stuck {
            debug!("retrying checkpoint scan");
            vec![self.request_scan()]
        } else {
            Vec::new()
        }
    }

    /// Returns true when the view changed.
    pub fn watchdog(&mut self, now: Instant) -> bool {
        let Some(flight) = self.in_flight.as_mut() else {
            return false;
        };
        match flight.cancel_deadline {
            Some(deadline) if now >= deadline => {
                flight.cancel_deadline = None;
                self.info = Some("Still cancelling…".into());
                true
            }
            _ => false,
        }
    }

    fn task_finished(&mut self, generation: u64, outcome: TaskOutcome) -> Vec<Effect> {
        let flight = match self.in_flight.take() {
            Some(f) if f.generation == generation => f,
            other => {
                self.in_flight = other;
                debug!(generation, "discarding stale task outcome");
                return Vec::new();
            }
        };

        if self.info.as_deref() == Some("Still cancelling…") {
            self.info = None;
        }

        match outcome {
            TaskOutcome::Cancelled => {
                info!(generation, reason = ?flight.cancel_reason, "task cancelled");
                if self.quitting {
                    return Vec::new();
                }
                if self.relaunch_pending && self.looping {
                    return self.launch().into_iter().collect();
                }
                if flight.cancel_reason == Some(CancelReason::Reconfigure) && self.looping {
                    if self.relaunch_on_edit {
                        return self.launch().into_iter().collect();
                    }
                    self.looping = false;
                    self.info = Some("Task updated. Press space to resume with it.".into());
                }
                Vec::new()
            }
            TaskOutcome::Completed | TaskOutcome::Failed(_) => {
                self.relaunch_pending = false;
                self.cycles += 1;
                self.last_cycle_at = Some(local_clock());
                match outcome {
                    TaskOutcome::Failed(e) => self.last_error = Some(e.into()),
                    _ => {
                        if !matches!(self.last_error, Some(SupervisorError::Config(_))) {
                            self.last_error = None;
                        }
                    }
                }
                if self.looping && !self.quitting {
                    vec![self.request_scan()]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn toggle_looping(&mut self) -> Vec<Effect> {
        self.looping = !self.looping;
        debug!(looping = self.looping, "loop toggled");
        if !self.looping {
            self.relaunch_pending = false;
            self.cancel_in_flight(CancelReason::Pause);
            return Vec::new();
        }

        self.info = None;
        if self.in_flight.is_some() {
            // The previous run must report back before the next one starts.
            self.relaunch_pending = true;
            return Vec::new();
        }
        if self.checkpoint.is_some() {
            self.pending_scan = None;
            return self.launch().into_iter().collect();
        }
        if self.pending_scan.is_none() {
            return vec![self.request_scan()];
        }
        Vec::new()
    }

    fn submit_task(&mut self) -> Vec<Effect> {
        match TaskConfig::parse(&self.editor.text()) {
            Err(e) => {
                debug!(error = %e, "rejected task configuration");
                self.last_error = Some(e.into());
            }
            Ok(task) => {
                info!(
                    task = task.as_str(),
                    weights = ?task.weights().keys().collect::<Vec<_>>(),
                    "task configuration accepted"
                );
                self.task = task;
                self.last_error = None;
                self.editor.blur();
                if self.looping {
                    self.cancel_in_flight(CancelReason::Reconfigure);
                }
            }
        }
        Vec::new()
    }

    fn quit(&mut self) -> Vec<Effect> {
        self.quitting = true;
        self.relaunch_pending = false;
        self.cancel_in_flight(CancelReason::Quit);
        vec![Effect::Quit]
    }

    fn request_scan(&mut self) -> Effect {
        self.scan_generation += 1;
        self.pending_scan = Some(self.scan_generation);
        Effect::Scan {
            generation: self.scan_generation,
        }
    }

    fn launch(&mut self) -> Option<Effect> {
        if self.in_flight.is_some() {
            return None;
        }
        let checkpoint = self.checkpoint.clone()?;
        self.task_generation += 1;
        self.relaunch_pending = false;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            generation: self.task_generation,
            cancel: cancel.clone(),
            cancel_reason: None,
            cancel_deadline: None,
        });
        Some(Effect::Launch {
            generation: self.task_generation,
            checkpoint,
            task: self.task.clone(),
            cancel,
        })
    }

    /// Fire the in-flight run's token. Safe to call repeatedly or when idle.
    fn cancel_in_flight(&mut self, reason: CancelReason) {
        let Some(flight) = self.in_flight.as_mut() else {
            return;
        };
        if flight.cancel_reason.is_none() {
            info!(generation = flight.generation, ?reason, "cancelling task");
            flight.cancel_deadline = Some(Instant::now() + CANCEL_NOTICE_AFTER);
        }
        flight.cancel_reason = Some(reason);
        flight.cancel.cancel();
    }
}

fn local_clock() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "now".into())
}

#[cfg(test)]
impl Supervisor {
    fn looping(&self) -> bool {
        self.looping
    }

    fn checkpoint(&self) -> Option<&std::path::Path> {
        self.checkpoint.as_deref()
    }

    fn task(&self) -> &TaskConfig {
        &self.task
    }

    fn editing(&self) -> bool {
        self.editor.is_focused()
    }

    fn last_error(&self) -> Option<&SupervisorError> {
        self.last_error.as_ref()
    }

    fn task_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_quitting(&self) -> bool {
        self.quitting
    }
}
