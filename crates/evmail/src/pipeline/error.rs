use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::mail::EmailError;
use crate::notifier::NotifierError;
use crate::proclog::ProclogError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Another import run holds the lock file.
    #[error("another import run is already in progress (lock file {path})")]
    AlreadyRunning { path: PathBuf },

    #[error("lock file I/O error on {path}: {source}")]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Home directory could not be resolved for default paths.
    #[error("cannot resolve home directory for default data paths")]
    NoHomeDirectory,

    #[error(transparent)]
    Mail(#[from] EmailError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Notifier(#[from] NotifierError),

    #[error(transparent)]
    Log(#[from] ProclogError),
}
