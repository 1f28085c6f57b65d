//! Append-only processing log with size rotation.
//!
//! Every pipeline run appends human-readable lines here, separate from
//! process logging, so an operator can see what the importer did without
//! grepping service output. The file rotates once it grows past the
//! configured size and rotated copies are pruned after the retention
//! window.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::config::LogConfig;

/// Lines shown on the operator status surface.
pub const DEFAULT_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum ProclogError {
    #[error("log I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, ProclogError>;

/// Handle on the processing log file.
pub struct ProcessingLog {
    path: PathBuf,
    max_size_bytes: u64,
    retention_days: u32,
}

impl ProcessingLog {
    /// `path` is the resolved log location (`Config::log_path`); rotation
    /// and retention settings come from the log section.
    pub fn new(path: PathBuf, log: &LogConfig) -> Self {
        Self {
            path,
            max_size_bytes: log.max_size_bytes,
            retention_days: log.retention_days,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one timestamped line, rotating first if the file is full.
    pub fn append(&self, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let stamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        writeln!(file, "[{stamp}] {message}").map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// Returns the last `n` lines, newest first.
    pub fn tail(&self, n: usize) -> Result<Vec<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        Ok(content
            .lines()
            .rev()
            .take(n)
            .map(|line| line.to_string())
            .collect())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.io_err(e)),
        };
        if size <= self.max_size_bytes {
            return Ok(());
        }

        let rotated = self.rotated_path(Utc::now());
        fs::rename(&self.path, &rotated).map_err(|e| self.io_err(e))?;
        log::info!(
            "Rotated processing log ({size} bytes) to {}",
            rotated.display()
        );

        self.prune_rotated();
        Ok(())
    }

    fn rotated_path(&self, at: DateTime<Utc>) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "processing.log".to_string());
        self.path
            .with_file_name(format!("{name}.{}", at.format("%Y%m%d%H%M%S")))
    }

    /// Deletes rotated copies past retention. Failures here only warn;
    /// a stale archive must not block logging.
    fn prune_rotated(&self) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let Some(base) = self.path.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            return;
        };
        let entries = match fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot scan log directory for pruning: {e}");
                return;
            }
        };

        let cutoff = Utc::now() - Duration::days(i64::from(self.retention_days));
        let prefix = format!("{base}.");

        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = file_name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(rotated_at) = parse_rotation_stamp(stamp) else {
                continue;
            };
            if rotated_at < cutoff {
                if let Err(e) = fs::remove_file(entry.path()) {
                    log::warn!("Failed to prune rotated log {file_name}: {e}");
                } else {
                    log::info!("Pruned rotated log {file_name}");
                }
            }
        }
    }

    fn io_err(&self, source: std::io::Error) -> ProclogError {
        ProclogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_rotation_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    use chrono::NaiveDateTime;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}
