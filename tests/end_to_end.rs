use checkpoint_watch::error::{LocateError, SupervisorError};
use checkpoint_watch::model::{KeyInput, Phase, Snapshot, WatchConfig};
use checkpoint_watch::orchestrator::{run_controller, UiCommand, UiUpdate};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    ui_rx: UnboundedReceiver<UiUpdate>,
    cmd_tx: UnboundedSender<UiCommand>,
    controller: JoinHandle<anyhow::Result<()>>,
}

fn start(cfg: WatchConfig) -> Harness {
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let controller = tokio::spawn(async move { run_controller(&cfg, ui_tx, cmd_rx).await });
    Harness {
        ui_rx,
        cmd_tx,
        controller,
    }
}

impl Harness {
    async fn wait_for(&mut self, what: &str, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let found = timeout(WAIT, async {
            while let Some(update) = self.ui_rx.recv().await {
                match update {
                    UiUpdate::State(snap) if pred(&snap) => return Some(*snap),
                    UiUpdate::State(_) => {}
                    UiUpdate::Shutdown => return None,
                }
            }
            None
        })
        .await;
        match found {
            Ok(Some(snap)) => snap,
            Ok(None) => panic!("controller shut down while waiting for {what}"),
            Err(_) => panic!("timed out waiting for {what}"),
        }
    }

    async fn quit_with(mut self, key: KeyInput) {
        self.cmd_tx.send(UiCommand::Key(key)).unwrap();
        let shut_down = timeout(Duration::from_secs(2), async {
            while let Some(update) = self.ui_rx.recv().await {
                if matches!(update, UiUpdate::Shutdown) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(shut_down);
        timeout(Duration::from_secs(2), self.controller)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

fn stub_script(dir: &Path, body: &str) -> std::path::PathBuf {
    let script = dir.join("run_inference.sh");
    std::fs::write(&script, body).unwrap();
    script
}

fn config(root: &Path, script: &Path) -> WatchConfig {
    WatchConfig {
        results_dir: root.to_path_buf(),
        interpreter: "sh".into(),
        script: script.to_path_buf(),
        retry_interval: Some(Duration::from_millis(100)),
        ..WatchConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn discovers_late_checkpoint_and_keeps_cycling() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ray_results");
    std::fs::create_dir(&root).unwrap();
    let marker = dir.path().join("runs.log");
    let script = stub_script(
        dir.path(),
        &format!("echo \"$2\" >> '{}'\n", marker.display()),
    );

    let mut h = start(config(&root, &script));

    let idle = h
        .wait_for("a failed first scan", |s| s.last_error.is_some())
        .await;
    assert_eq!(idle.phase, Phase::Idle);
    assert!(idle.checkpoint.is_none());
    assert!(matches!(
        idle.last_error,
        Some(SupervisorError::Locate(LocateError::NoMatch(_)))
    ));

    let checkpoint = root.join("exp").join("checkpoint_000001");
    std::fs::create_dir_all(&checkpoint).unwrap();
    let canonical = checkpoint.canonicalize().unwrap();

    let cycling = h.wait_for("two cycles", |s| s.cycles >= 2).await;
    assert_eq!(cycling.checkpoint.as_deref(), Some(canonical.as_path()));
    assert!(cycling.last_error.is_none());
    assert!(cycling.looping);

    h.quit_with(KeyInput::Char('q')).await;

    let runs = std::fs::read_to_string(&marker).unwrap();
    let lines: Vec<&str> = runs.lines().collect();
    assert!(lines.len() >= 2, "expected at least two runs, got {lines:?}");
    for line in lines {
        assert_eq!(Path::new(line), canonical.as_path());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interrupt_during_a_long_run_exits_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ray_results");
    std::fs::create_dir_all(root.join("exp").join("checkpoint_000001")).unwrap();
    let script = stub_script(dir.path(), "exec sleep 30\n");

    let mut h = start(config(&root, &script));
    let running = h
        .wait_for("the task to start", |s| s.phase == Phase::Running)
        .await;
    assert!(running.checkpoint.is_some());

    h.quit_with(KeyInput::Interrupt).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_task_is_reported_and_the_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ray_results");
    std::fs::create_dir_all(root.join("exp").join("checkpoint_000001")).unwrap();
    let script = stub_script(dir.path(), "echo 'Traceback: boom' >&2\nexit 3\n");

    let mut h = start(config(&root, &script));
    let failed = h
        .wait_for("a task failure", |s| {
            matches!(s.last_error, Some(SupervisorError::Task(_)))
        })
        .await;
    match failed.last_error {
        Some(SupervisorError::Task(e)) => assert!(e.output().contains("Traceback: boom")),
        other => panic!("unexpected error slot {other:?}"),
    }
    assert!(failed.looping);

    h.wait_for("another cycle after the failure", |s| s.cycles >= 2)
        .await;
    h.quit_with(KeyInput::Char('q')).await;
}
