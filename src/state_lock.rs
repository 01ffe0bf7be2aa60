//! Sidecar lock that keeps two single-shot runs from interleaving their
//! load and save of the same state file.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Held from load to save; the flock goes away with the file handle.
pub struct StateLock {
    _file: File,
}

impl StateLock {
    /// Lock `<state>.lock`, waiting if another run holds it. The state file
    /// is replaced by rename on save, so it cannot carry the lock itself.
    pub fn acquire(state: &Path, verbose: u8) -> Result<Self> {
        let path = sidecar(state);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            if verbose > 0 {
                eprintln!("waiting for {}", path.display());
            }
            file.lock_exclusive()
                .with_context(|| format!("Failed to lock {}", path.display()))?;
        }
        Ok(Self { _file: file })
    }
}

fn sidecar(state: &Path) -> PathBuf {
    let mut name = state.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
