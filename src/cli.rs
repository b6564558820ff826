use crate::model::{WatchConfig, DEFAULT_TASK};
use crate::task::TaskConfig;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "checkpoint-watch",
    version,
    about = "Replay the newest training checkpoint in a loop with a live TUI"
)]
pub struct Cli {
    /// Root directory searched for checkpoint directories
    #[arg(long, default_value = "ray_results")]
    pub results_dir: PathBuf,

    /// Name prefix of checkpoint directories
    #[arg(long, default_value = "checkpoint_")]
    pub prefix: String,

    /// Inference script run against each checkpoint
    #[arg(long, default_value = "run_inference.py")]
    pub script: PathBuf,

    /// Program used to run the script
    #[arg(long, default_value = "python")]
    pub interpreter: String,

    /// Pass the current task to the script as `--task <json>`
    #[arg(long)]
    pub forward_task: bool,

    /// Relaunch right away when a task edit interrupts a run
    #[arg(long)]
    pub relaunch_on_edit: bool,

    /// Initial task weights (a JSON object)
    #[arg(long, default_value = DEFAULT_TASK)]
    pub task: String,

    /// How often to re-scan after a failed search (0s disables)
    #[arg(long, default_value = "5s")]
    pub retry_interval: humantime::Duration,

    /// Start with the loop paused
    #[arg(long)]
    pub start_paused: bool,

    /// Write logs here instead of the per-user data directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Build a `WatchConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> WatchConfig {
    let retry = Duration::from(args.retry_interval);
    WatchConfig {
        results_dir: args.results_dir.clone(),
        prefix: args.prefix.clone(),
        interpreter: args.interpreter.clone(),
        script: args.script.clone(),
        initial_task: args.task.clone(),
        forward_task: args.forward_task,
        relaunch_on_edit: args.relaunch_on_edit,
        retry_interval: (!retry.is_zero()).then_some(retry),
        start_looping: !args.start_paused,
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);

    // Fail before the terminal switches to raw mode so the message stays readable.
    TaskConfig::parse(&cfg.initial_task).context("--task is not a valid task")?;
    crate::bootstrap::ensure_script(&cfg.script)?;
    crate::bootstrap::ensure_results_dir(&cfg.results_dir, &cfg.prefix)?;

    info!(config = ?cfg, "starting checkpoint watch");
    crate::tui::run(cfg).await
}
