//! Pidfile handling
//!
//! Written on startup, removed on clean stop. An existing pidfile
//! naming a live process aborts startup; a stale one is overwritten
//! with a warning.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A pidfile that removes itself when dropped
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`
    pub fn create(path: &Path) -> Result<Self> {
        if let Ok(existing) = fs::read_to_string(path) {
            if let Ok(pid) = existing.trim().parse::<u32>() {
                if Path::new(&format!("/proc/{}", pid)).exists() {
                    bail!(
                        "blockyd appears to be running already (pid {} from {})",
                        pid,
                        path.display()
                    );
                }
                warn!(
                    "removing stale pidfile {} (process {} is gone)",
                    path.display(),
                    pid
                );
            }
        }

        fs::write(path, std::process::id().to_string())
            .with_context(|| format!("cannot write pidfile {}", path.display()))?;
        debug!("wrote pidfile {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("cannot remove pidfile {}: {}", self.path.display(), e);
        }
    }
}
