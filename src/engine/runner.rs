//! External evaluation process with cooperative cancellation.

use crate::error::TaskError;
use crate::model::{TaskOutcome, WatchConfig};
use crate::task::TaskConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on captured output kept for failure reports.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Failures can repeat every cycle, so logs keep only the end of the output.
const LOGGED_OUTPUT_LINES: usize = 20;

/// Grace period for pipe readers after the process exits.
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

type OutputSink = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Clone)]
pub struct TaskRunner {
    interpreter: String,
    script: PathBuf,
    forward_task: bool,
}

impl TaskRunner {
    pub fn new(cfg: &WatchConfig) -> Self {
        Self {
            interpreter: cfg.interpreter.clone(),
            script: cfg.script.clone(),
            forward_task: cfg.forward_task,
        }
    }

    /// `<interpreter> <script> --checkpoint <path> [--task <json>]`
    pub fn command(&self, checkpoint: &Path, task: &TaskConfig) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script).arg("--checkpoint").arg(checkpoint);
        if self.forward_task {
            cmd.arg("--task").arg(task.as_str());
        }
        cmd
    }

    /// Run the task to a single terminal outcome.
    ///
    /// Child exit is polled before the cancellation token, so a cancel that
    /// lands after the process already finished still yields the natural
    /// outcome.
    pub async fn run(
        &self,
        checkpoint: &Path,
        task: &TaskConfig,
        cancel: CancellationToken,
    ) -> TaskOutcome {
        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled;
        }

        let mut cmd = self.command(checkpoint, task);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(checkpoint = %checkpoint.display(), "spawning task process");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                warn!(program = %self.interpreter, error = %e, "failed to spawn task");
                return TaskOutcome::Failed(TaskError::Launch {
                    program: self.interpreter.clone(),
                    message: e.to_string(),
                });
            }
        };

        let sink: OutputSink = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, sink.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, sink.clone()));
        }

        let Some(status) = wait_or_cancel(&mut child, &cancel).await else {
            info!(pid = ?child.id(), "cancellation requested; killing process");
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to signal cancelled process");
            }
            let _ = child.wait().await;
            readers.iter().for_each(JoinHandle::abort);
            return TaskOutcome::Cancelled;
        };

        match status {
            Ok(status) if status.success() => {
                readers.iter().for_each(JoinHandle::abort);
                debug!("task completed");
                TaskOutcome::Completed
            }
            Ok(status) => {
                let output = collect_output(readers, &sink).await;
                warn!(
                    exit_code = ?status.code(),
                    output = %output_tail(&output, LOGGED_OUTPUT_LINES),
                    "task exited with failure"
                );
                TaskOutcome::Failed(TaskError::NonZeroExit {
                    status: status.to_string(),
                    output,
                })
            }
            Err(e) => {
                let output = collect_output(readers, &sink).await;
                warn!(error = %e, "failed to wait on task process");
                TaskOutcome::Failed(TaskError::NonZeroExit {
                    status: format!("unknown ({e})"),
                    output,
                })
            }
        }
    }
}

/// `None` when the token fired first. An exit that has already happened wins
/// over a cancel that arrives afterwards.
async fn wait_or_cancel(
    child: &mut Child,
    cancel: &CancellationToken,
) -> Option<io::Result<ExitStatus>> {
    tokio::select! {
        biased;
        status = child.wait() => Some(status),
        () = cancel.cancelled() => None,
    }
}

/// Last `lines` lines of captured output.
fn output_tail(output: &str, lines: usize) -> &str {
    let mut start = output.len();
    for _ in 0..lines {
        match output[..start].trim_end_matches('\n').rfind('\n') {
            Some(i) => start = i,
            None => return output,
        }
    }
    output[start..].trim_start_matches('\n')
}

fn spawn_reader<R>(mut reader: R, sink: OutputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            if let Ok(mut buf) = sink.lock() {
                let keep = n.min(MAX_OUTPUT_BYTES.saturating_sub(buf.len()));
                buf.extend_from_slice(&chunk[..keep]);
            }
        }
    })
}

async fn collect_output(readers: Vec<JoinHandle<()>>, sink: &OutputSink) -> String {
    for reader in readers {
        if timeout(IO_CAPTURE_TIMEOUT, reader).await.is_err() {
            warn!("output capture timed out");
        }
    }
    let bytes = sink.lock().map(|b| b.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
