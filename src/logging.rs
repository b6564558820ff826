//! File-backed tracing.
//!
//! The terminal belongs to the TUI, so diagnostics never go to stdout or
//! stderr. `RUST_LOG` overrides the default `checkpoint_watch=info` filter.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "checkpoint-watch.log";
const DEFAULT_FILTER: &str = "checkpoint_watch=info";

/// `<data-local-dir>/checkpoint-watch/checkpoint-watch.log`, or the working
/// directory when the platform has no data dir.
pub fn default_log_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("checkpoint-watch").join(LOG_FILE_NAME),
        None => PathBuf::from(LOG_FILE_NAME),
    }
}

/// Install the global subscriber. Returns the file being written.
pub fn init(path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_log_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()
        .context("install tracing subscriber")?;

    Ok(path)
}
