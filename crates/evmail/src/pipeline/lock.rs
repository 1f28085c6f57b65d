//! Run-overlap guard.
//!
//! A slow IMAP fetch can outlive the cron interval. The lock file makes
//! the second invocation fail fast instead of racing the first over the
//! same unread messages.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::PipelineError;

/// Held for the duration of one pipeline run. The file is removed on
/// drop, including when the run errors out.
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Creates the lock file, failing if it already exists.
    pub fn acquire(path: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| PipelineError::LockIo {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path).unwrap_or_default();
                log::warn!(
                    "Lock file {} already exists (pid {})",
                    path.display(),
                    holder.trim()
                );
                return Err(PipelineError::AlreadyRunning {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(PipelineError::LockIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        // PID for the operator; staleness is resolved by hand.
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            log::warn!("Could not record pid in lock file: {e}");
        }

        log::debug!("Acquired run lock {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock file {}: {e}", self.path.display());
        }
    }
}
