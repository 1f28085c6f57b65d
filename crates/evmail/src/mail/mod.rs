//! Mail source adapter.
//!
//! Connects to the submission mailbox over IMAP, fetches unread messages
//! in batches and parses them into [`IncomingMessage`] values. When no
//! mailbox is configured the adapter reports a capability-unavailable
//! condition so operator surfaces can show setup instructions instead of
//! a silent empty batch.

pub mod client;
pub mod error;
pub mod message;

pub use client::ImapClient;
pub use error::EmailError;
pub use message::IncomingMessage;

use crate::config::ImapConfig;

/// Returns the mailbox settings, or the capability-unavailable condition
/// when the deployment has no `imap` section.
pub fn require_configured(imap: Option<&ImapConfig>) -> error::Result<&ImapConfig> {
    imap.ok_or_else(|| {
        EmailError::CapabilityUnavailable(
            "email import is not configured (no imap section)".to_string(),
        )
    })
}

/// Operator-facing instructions shown when the mail source is not
/// configured. Returned through the degraded path instead of an error
/// page.
pub fn setup_instructions() -> String {
    "Email ingestion is not configured. Add an `imap` section to the config file:\n\
     \n\
       \"imap\": {\n\
         \"host\": \"imap.example.com\",\n\
         \"username\": \"events@example.com\",\n\
         \"password_env_var\": \"EVMAIL_IMAP_PASSWORD\"\n\
       }\n\
     \n\
     The account should receive Facebook event notification emails\n\
     (invite the mailbox address to events, or forward notifications to it)."
        .to_string()
}
