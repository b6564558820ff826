mod locator;
mod runner;

pub use locator::find_latest;
pub use runner::TaskRunner;

use crate::model::{EngineEvent, WatchConfig};
use crate::task::TaskConfig;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawns scans and task runs; each posts exactly one `EngineEvent` back.
pub struct Engine {
    results_dir: PathBuf,
    prefix: String,
    runner: TaskRunner,
    event_tx: UnboundedSender<EngineEvent>,
}

impl Engine {
    pub fn new(cfg: &WatchConfig, event_tx: UnboundedSender<EngineEvent>) -> Self {
        Self {
            results_dir: cfg.results_dir.clone(),
            prefix: cfg.prefix.clone(),
            runner: TaskRunner::new(cfg),
            event_tx,
        }
    }

    /// Walk the results tree off the async runtime. Scans are not cancelable.
    pub fn scan(&self, generation: u64) {
        let root = self.results_dir.clone();
        let prefix = self.prefix.clone();
        let tx = self.event_tx.clone();
        debug!(generation, root = %root.display(), "starting scan");
        tokio::task::spawn_blocking(move || {
            let result = find_latest(&root, &prefix);
            let _ = tx.send(EngineEvent::ScanFinished { generation, result });
        });
    }

    pub fn launch(
        &self,
        generation: u64,
        checkpoint: PathBuf,
        task: TaskConfig,
        cancel: CancellationToken,
    ) {
        let runner = self.runner.clone();
        let tx = self.event_tx.clone();
        info!(generation, checkpoint = %checkpoint.display(), "launching task");
        tokio::spawn(async move {
            let outcome = runner.run(&checkpoint, &task, cancel).await;
            let _ = tx.send(EngineEvent::TaskFinished {
                generation,
                outcome,
            });
        });
    }
}
