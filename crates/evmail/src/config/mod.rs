pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    default_config_path, Config, ConfirmationConfig, ImapConfig, LogConfig, ProcessingConfig,
    SmtpConfig, SmtpEncryption,
};
