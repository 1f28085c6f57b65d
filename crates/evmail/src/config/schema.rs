//! Configuration schema for the email event ingestion service.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config format version. Only "1.0" is supported.
    pub version: String,

    /// Path to the SQLite database. Defaults to `~/.evmail/data/evmail.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,

    /// Processing log settings.
    #[serde(default)]
    pub log: LogConfig,

    /// IMAP mailbox settings. When absent the mail source is treated as
    /// unavailable and operator surfaces show setup instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imap: Option<ImapConfig>,

    /// SMTP settings for the confirmation path.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Batch processing options.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Confirmation email options.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

/// Processing log file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file path. Defaults to `~/.evmail/logs/email_processing.log`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Rotate when the log exceeds this many bytes.
    #[serde(default = "default_log_max_size")]
    pub max_size_bytes: u64,

    /// Prune rotated copies older than this many days.
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_size_bytes: default_log_max_size(),
            retention_days: default_log_retention_days(),
        }
    }
}

/// IMAP mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    /// IMAP server hostname (e.g., "imap.gmail.com").
    pub host: String,

    /// IMAP server port (default: 993 for IMAPS).
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Whether to use TLS (required for security).
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Mailbox username (typically the email address).
    pub username: String,

    /// Password as a direct value. Discouraged; prefer the file or env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Path to a file holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env_var: Option<String>,

    /// Folder to poll (default: "INBOX").
    #[serde(default = "default_inbox")]
    pub folder: String,
}

/// SMTP settings for outbound confirmation mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env_var: Option<String>,

    #[serde(default)]
    pub encryption: SmtpEncryption,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            password_file: None,
            password_env_var: None,
            encryption: SmtpEncryption::default(),
        }
    }
}

/// Transport encryption for SMTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpEncryption {
    /// STARTTLS on a plaintext port (default).
    #[default]
    Tls,
    /// Implicit TLS (SMTPS).
    Ssl,
    /// No encryption. Only sensible for localhost relays.
    None,
}

/// Batch processing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum number of messages fetched per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Mark fetched messages as read after processing.
    #[serde(default = "default_true")]
    pub mark_as_read: bool,

    /// Delete fetched messages after processing.
    #[serde(default)]
    pub delete_processed: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            mark_as_read: true,
            delete_processed: false,
        }
    }
}

/// Confirmation email options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Send an acknowledgement email after each created event.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub from_email: String,

    #[serde(default)]
    pub from_name: String,

    #[serde(default)]
    pub reply_to: String,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            from_email: String::new(),
            from_name: String::new(),
            reply_to: String::new(),
        }
    }
}

impl Config {
    /// Resolved database path: configured value or the platform default.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(p) => Some(PathBuf::from(p)),
            None => default_database_path(),
        }
    }

    /// Resolved processing log path: configured value or the platform default.
    pub fn log_path(&self) -> Option<PathBuf> {
        match &self.log.path {
            Some(p) => Some(PathBuf::from(p)),
            None => default_log_path(),
        }
    }

    /// Lock file guarding against overlapping runs, kept next to the log.
    pub fn lock_path(&self) -> Option<PathBuf> {
        self.log_path().map(|p| p.with_extension("lock"))
    }
}

/// Returns the canonical config path: `~/.evmail/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".evmail").join("config.json"))
}

/// Returns the canonical database path: `~/.evmail/data/evmail.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".evmail").join("data").join("evmail.db"))
}

/// Returns the canonical log path: `~/.evmail/logs/email_processing.log`.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".evmail").join("logs").join("email_processing.log"))
}

fn default_true() -> bool {
    true
}

fn default_imap_port() -> u16 {
    993
}

fn default_inbox() -> String {
    "INBOX".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_batch_size() -> u32 {
    50
}

fn default_log_max_size() -> u64 {
    10 * 1024 * 1024
}

fn default_log_retention_days() -> u32 {
    30
}
