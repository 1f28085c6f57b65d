//! Confirmation emails for ingested events.
//!
//! Sending is best-effort: the pipeline logs a failed confirmation and
//! moves on, because the event row is already committed and a flaky SMTP
//! relay must not make the import look failed.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::{ConfirmationConfig, SmtpConfig, SmtpEncryption};
use crate::extract::EventDraft;
use crate::secrets::{self, SecretError};

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("invalid email address '{value}'")]
    InvalidAddress { value: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Sends plain-text confirmations to event submitters.
pub struct Notifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    reply_to: Option<Mailbox>,
}

impl Notifier {
    /// Builds a notifier, or `None` when confirmations are disabled.
    pub fn from_config(
        smtp: &SmtpConfig,
        confirmation: &ConfirmationConfig,
    ) -> Result<Option<Self>, NotifierError> {
        if !confirmation.enabled {
            log::debug!("Confirmation emails disabled");
            return Ok(None);
        }

        let from = mailbox(&confirmation.from_email, Some(&confirmation.from_name))?;
        let reply_to = if confirmation.reply_to.is_empty() {
            None
        } else {
            Some(mailbox(&confirmation.reply_to, None)?)
        };

        Ok(Some(Self {
            transport: build_transport(smtp)?,
            from,
            reply_to,
        }))
    }

    /// Sends one confirmation for a freshly created pending event.
    pub async fn send_confirmation(
        &self,
        recipient: &str,
        draft: &EventDraft,
    ) -> Result<(), NotifierError> {
        let to = mailbox(recipient, None)?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Event received: {}", draft.title));
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let message = builder.body(confirmation_body(draft))?;
        self.transport.send(message).await?;

        log::info!("Confirmation sent to {recipient} for '{}'", draft.title);
        Ok(())
    }
}

fn build_transport(
    smtp: &SmtpConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifierError> {
    let mut builder = match smtp.encryption {
        SmtpEncryption::Tls => {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        }
        SmtpEncryption::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?,
        SmtpEncryption::None => {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        }
    };
    builder = builder.port(smtp.port);

    if let Some(username) = &smtp.username {
        let password = secrets::resolve_secret_optional(
            smtp.password.as_deref(),
            smtp.password_file.as_deref(),
            smtp.password_env_var.as_deref(),
        )?;
        let password = password
            .map(|p| p.expose_secret().to_string())
            .unwrap_or_default();
        builder = builder.credentials(Credentials::new(username.clone(), password));
    }

    Ok(builder.build())
}

fn mailbox(email: &str, name: Option<&str>) -> Result<Mailbox, NotifierError> {
    let address: Address = email.parse().map_err(|_| NotifierError::InvalidAddress {
        value: email.to_string(),
    })?;
    let name = name.filter(|n| !n.is_empty()).map(|n| n.to_string());
    Ok(Mailbox::new(name, address))
}

fn confirmation_body(draft: &EventDraft) -> String {
    let date = draft
        .start
        .map(|dt| dt.format("%A, %B %-d, %Y at %-I:%M %p").to_string())
        .unwrap_or_else(|| "To be determined".to_string());
    let location = draft
        .location
        .clone()
        .unwrap_or_else(|| "To be determined".to_string());

    format!(
        "Thank you! Your event has been received and is pending review.\n\
         \n\
         Event: {}\n\
         Date: {}\n\
         Location: {}\n\
         \n\
         It will appear on the public calendar once an administrator\n\
         approves it. No further action is needed on your part.\n",
        draft.title, date, location
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft() -> EventDraft {
        EventDraft {
            title: "Summer Music Festival".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 7, 15)
                .unwrap()
                .and_hms_opt(18, 0, 0),
            location: Some("Yakima Valley Park".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_confirmation_yields_no_notifier() {
        let smtp = SmtpConfig::default();
        let confirmation = ConfirmationConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(Notifier::from_config(&smtp, &confirmation)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_enabled_confirmation_requires_valid_from() {
        let smtp = SmtpConfig::default();
        let confirmation = ConfirmationConfig {
            enabled: true,
            from_email: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Notifier::from_config(&smtp, &confirmation),
            Err(NotifierError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_body_includes_event_fields() {
        let body = confirmation_body(&draft());
        assert!(body.contains("Summer Music Festival"));
        assert!(body.contains("July 15, 2024"));
        assert!(body.contains("Yakima Valley Park"));
        assert!(body.contains("pending review"));
    }

    #[test]
    fn test_body_uses_placeholder_for_missing_fields() {
        let bare = EventDraft {
            title: "Mystery Meetup".to_string(),
            ..Default::default()
        };
        let body = confirmation_body(&bare);
        assert!(body.contains("Date: To be determined"));
        assert!(body.contains("Location: To be determined"));
    }
}
