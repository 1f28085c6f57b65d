//! Email import pipeline.
//!
//! Wires the mailbox client, classifier, extractor, writer and notifier
//! into one cron-driven run, guarded by a lock file so overlapping
//! invocations cannot double-process a mailbox.

pub mod error;
pub mod lock;
pub mod runner;

pub use error::PipelineError;
pub use lock::RunLock;
pub use runner::{IngestPipeline, RunReport};
