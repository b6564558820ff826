//! Newest-checkpoint lookup.
//!
//! Performs a full tree walk on every call; nothing is cached between scans.

use crate::error::LocateError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Return the most recently modified directory under `root` whose name starts
/// with `prefix`, as an absolute, canonical path.
///
/// Ties on modification time keep the first directory walked. Entries whose
/// metadata cannot be read are skipped; any other walk error fails the scan.
pub fn find_latest(root: &Path, prefix: &str) -> Result<PathBuf, LocateError> {
    match std::fs::metadata(root) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LocateError::NotFound(root.to_path_buf()));
        }
        Err(e) => return Err(LocateError::Traversal(e.to_string())),
    }

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| LocateError::Traversal(e.to_string()))?;
        if !entry.file_type().is_dir() || !entry.file_name().to_string_lossy().starts_with(prefix)
        {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(t) => t,
            None => {
                trace!(path = %entry.path().display(), "skipping entry without mtime");
                continue;
            }
        };
        let newer = match &latest {
            Some((best, _)) => modified > *best,
            None => true,
        };
        if newer {
            latest = Some((modified, entry.into_path()));
        }
    }

    let (_, path) = latest.ok_or_else(|| LocateError::NoMatch(root.to_path_buf()))?;
    let abs = std::fs::canonicalize(&path).map_err(|e| {
        LocateError::Traversal(format!(
            "could not get absolute path for checkpoint {}: {e}",
            path.display()
        ))
    })?;
    debug!(checkpoint = %abs.display(), "located newest checkpoint");
    Ok(abs)
}
