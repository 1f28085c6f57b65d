pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod mail;
pub mod notifier;
pub mod pipeline;
pub mod proclog;
pub mod secrets;
pub mod status;
pub mod writer;

pub use classifier::Classifier;
pub use config::{load_config, load_config_from_str, Config};
pub use db::Database;
pub use error::{ConfigError, EvmailError, Result};
pub use extract::{EventDraft, Extractor};
pub use notifier::{Notifier, NotifierError};
pub use pipeline::{IngestPipeline, PipelineError, RunReport};
pub use proclog::ProcessingLog;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use status::StatusReport;
