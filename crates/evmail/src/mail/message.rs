//! Parsed representation of one fetched mailbox item.

use chrono::{DateTime, TimeZone, Utc};
use mail_parser::MessageParser;

use super::error::{EmailError, Result};

/// One fetched mailbox message, reduced to the fields the classifier and
/// extractor consume. Ephemeral: lives for a single processing pass and
/// is never persisted.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// IMAP UID within the polled folder.
    pub uid: u32,
    /// Sender address (addr-spec only, no display name).
    pub sender: String,
    /// Subject line, empty if missing.
    pub subject: String,
    /// Plaintext body. Falls back to the raw HTML part when the message
    /// has no text part.
    pub body: String,
    /// Date header, absent when the message carries none. Deduplication
    /// keys on this, so it must never be padded with a wall-clock value.
    pub date: Option<DateTime<Utc>>,
    /// When the message was fetched; the timestamp of last resort.
    pub fetched_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// Parses a raw RFC 5322 message.
    pub fn parse(raw: &[u8], uid: u32) -> Result<Self> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| EmailError::ParseError("Failed to parse email message".to_string()))?;

        let sender = message
            .from()
            .and_then(|addrs| addrs.first())
            .and_then(|addr| addr.address())
            .unwrap_or_default()
            .to_string();

        let subject = message.subject().unwrap_or_default().to_string();

        let body = message
            .body_text(0)
            .map(|t| t.into_owned())
            .or_else(|| message.body_html(0).map(|t| t.into_owned()))
            .unwrap_or_default();

        let date = message
            .date()
            .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single());

        Ok(Self {
            uid,
            sender,
            subject,
            body,
            date,
            fetched_at: Utc::now(),
        })
    }

    /// Date header, falling back to the fetch time when absent.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.date.unwrap_or(self.fetched_at)
    }

    /// Host part of the sender address, empty when the sender has none.
    pub fn sender_domain(&self) -> &str {
        self.sender
            .rsplit_once('@')
            .map(|(_, host)| host)
            .unwrap_or("")
    }
}
