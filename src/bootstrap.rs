//! Startup preconditions checked before the terminal is taken over.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The inference script must exist; nothing useful can run without it.
pub fn ensure_script(script: &Path) -> Result<()> {
    if !script.is_file() {
        bail!(
            "script '{}' not found. Please make sure it's in the working directory",
            script.display()
        );
    }
    Ok(())
}

/// Create `<root>/exp/<prefix>000001` when the results root is missing so the
/// first scan has somewhere to look. Returns the placeholder when one was made.
pub fn ensure_results_dir(root: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    if root.exists() {
        return Ok(None);
    }
    let placeholder = root.join("exp").join(format!("{prefix}000001"));
    std::fs::create_dir_all(&placeholder)
        .with_context(|| format!("create placeholder checkpoint {}", placeholder.display()))?;
    warn!(
        path = %placeholder.display(),
        "results directory was missing; created a placeholder checkpoint"
    );
    info!("replace the placeholder with real checkpoint directories");
    Ok(Some(placeholder))
}
