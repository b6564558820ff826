//! Run lifecycle controller.
//!
//! Owns the supervisor, executes the effects it returns, and publishes a fresh
//! snapshot to the presentation layer after every event.

use super::supervisor::{Effect, Supervisor};
use crate::engine::Engine;
use crate::model::{EngineEvent, KeyInput, Snapshot, WatchConfig};
use anyhow::{Context, Result};
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Key(KeyInput),
    /// The UI went away (terminal closed, input error).
    Quit,
}

/// Messages for the UI thread.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    State(Box<Snapshot>),
    Shutdown,
}

/// Start background work for each effect. Returns true once quit was requested.
fn execute(engine: &Engine, effects: Vec<Effect>) -> bool {
    let mut quit = false;
    for effect in effects {
        match effect {
            Effect::Scan { generation } => engine.scan(generation),
            Effect::Launch {
                generation,
                checkpoint,
                task,
                cancel,
            } => engine.launch(generation, checkpoint, task, cancel),
            Effect::Quit => quit = true,
        }
    }
    quit
}

/// Multiplex UI commands, engine results and timers into the supervisor.
pub async fn run_controller(
    cfg: &WatchConfig,
    ui_tx: UnboundedSender<UiUpdate>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<EngineEvent>();
    let engine = Engine::new(cfg, event_tx);
    let mut supervisor = Supervisor::new(cfg).context("initial task configuration")?;

    // Cancel watchdog: keep UI feedback alive if a cancel stalls.
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));
    let mut retry = cfg.retry_interval.filter(|d| !d.is_zero()).map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    execute(&engine, supervisor.start());
    let _ = ui_tx.send(UiUpdate::State(Box::new(supervisor.snapshot())));

    loop {
        let effects = tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Key(key)) => supervisor.handle_key(key),
                    // Quit is fire-and-forget: the in-flight run is signalled, not awaited.
                    Some(UiCommand::Quit) | None => supervisor.handle_key(KeyInput::Interrupt),
                }
            }
            Some(event) = event_rx.recv() => supervisor.handle_engine(event),
            _ = watchdog.tick() => {
                if !supervisor.watchdog(Instant::now()) {
                    continue;
                }
                Vec::new()
            }
            _ = async {
                match retry.as_mut() {
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => futures::future::pending::<()>().await,
                }
            } => supervisor.retry_due(),
        };

        let quit = execute(&engine, effects);
        let _ = ui_tx.send(UiUpdate::State(Box::new(supervisor.snapshot())));
        debug!(phase = ?supervisor.phase(), "state published");
        if quit {
            info!("quit requested");
            let _ = ui_tx.send(UiUpdate::Shutdown);
            break Ok(());
        }
    }
}
