//! IMAP client for the submission mailbox.

use async_imap::Session;
use async_native_tls::TlsConnector;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::config::ImapConfig;
use crate::secrets;

use super::error::{EmailError, Result};

/// Type alias for the underlying async stream (async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// IMAP client for fetching submission emails.
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
    config: ImapConfig,
}

impl ImapClient {
    /// Creates a new IMAP client with the given configuration.
    pub fn new(config: ImapConfig) -> Self {
        Self {
            session: None,
            config,
        }
    }

    /// Connects to the IMAP server and authenticates.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.config.use_tls {
            return Err(EmailError::ConfigError(
                "TLS is required for secure email connections".to_string(),
            ));
        }

        let password = self.get_password()?;

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to IMAP server at {}", addr);

        // Establish TCP connection using std::net and wrap with async-io
        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

        // Wrap with TLS
        let tls = TlsConnector::new();
        let tls_stream = tls.connect(&self.config.host, tcp_stream).await?;

        let client = async_imap::Client::new(tls_stream);

        let session = client
            .login(&self.config.username, password.expose_secret())
            .await
            .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))?;

        info!("Successfully authenticated to IMAP server");
        self.session = Some(session);
        Ok(())
    }

    /// Gets the password from configured sources (direct value, file, or env var).
    fn get_password(&self) -> Result<SecretString> {
        if self.config.password.is_some() {
            warn!(
                "Using a direct password value in config is not recommended. \
                 Consider password_env_var or password_file instead."
            );
        }
        secrets::resolve_secret(
            self.config.password.as_deref(),
            self.config.password_file.as_deref(),
            self.config.password_env_var.as_deref(),
        )
        .map_err(|e| EmailError::CredentialsNotFound(e.to_string()))
    }

    /// Opens a folder with SELECT. Read-write access is needed because
    /// processed messages may be flagged seen or deleted afterwards.
    pub async fn select_folder(&mut self, folder: &str) -> Result<()> {
        let session = self.require_session()?;

        info!("Selecting folder: {}", folder);

        session.select(folder).await.map_err(|e| {
            if e.to_string().contains("Mailbox doesn't exist") || e.to_string().contains("NO") {
                EmailError::FolderNotFound(folder.to_string())
            } else {
                EmailError::ProtocolError(e.to_string())
            }
        })?;

        Ok(())
    }

    /// Searches for unseen messages. Returns matching UIDs.
    pub async fn search_unseen(&mut self) -> Result<Vec<u32>> {
        let session = self.require_session()?;

        let uids = session
            .uid_search("UNSEEN")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        debug!("Found {} unseen messages", uid_list.len());
        Ok(uid_list)
    }

    /// Fetches the raw bodies of at most `max` unseen messages.
    ///
    /// Uses `BODY.PEEK[]` so the fetch itself never marks anything read;
    /// read/delete side effects only happen through [`Self::mark_seen`]
    /// and [`Self::delete`], controlled by the processing flags.
    pub async fn fetch_unread_batch(&mut self, max: usize) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut uids = self.search_unseen().await?;
        uids.truncate(max);
        self.fetch_peek(&uids).await
    }

    /// Fetches multiple messages by UID without marking them read.
    pub async fn fetch_peek(&mut self, uids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.require_session()?;
        let uid_set = join_uids(uids);

        debug!("Fetching {} messages with UIDs: {}", uids.len(), uid_set);

        let mut messages = session
            .uid_fetch(&uid_set, "(UID BODY.PEEK[])")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(message_result) = messages.next().await {
            match message_result {
                Ok(message) => {
                    if let (Some(uid), Some(body)) = (message.uid, message.body()) {
                        results.push((uid, body.to_vec()));
                    } else {
                        warn!("Message missing UID or body");
                    }
                }
                Err(e) => {
                    warn!("Error fetching message: {}", e);
                }
            }
        }

        debug!("Successfully fetched {} messages", results.len());
        Ok(results)
    }

    /// Marks the given UIDs as seen.
    pub async fn mark_seen(&mut self, uids: &[u32]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }

        let session = self.require_session()?;
        let uid_set = join_uids(uids);
        debug!("Marking UIDs as seen: {}", uid_set);

        let mut responses = session
            .uid_store(&uid_set, "+FLAGS (\\Seen)")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        while responses.next().await.is_some() {}
        Ok(())
    }

    /// Flags the given UIDs deleted and expunges the folder.
    pub async fn delete(&mut self, uids: &[u32]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }

        let session = self.require_session()?;
        let uid_set = join_uids(uids);
        debug!("Deleting UIDs: {}", uid_set);

        let mut responses = session
            .uid_store(&uid_set, "+FLAGS (\\Deleted)")
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        while responses.next().await.is_some() {}
        drop(responses);

        let expunged = session
            .expunge()
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        let mut expunged = std::pin::pin!(expunged);
        while expunged.next().await.is_some() {}
        Ok(())
    }

    /// Disconnects from the IMAP server gracefully.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }

    /// Checks if the client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn require_session(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| EmailError::ConnectionFailed("Not connected".to_string()))
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit disconnect - session will be closed");
        }
    }
}

/// Builds an IMAP UID set string (e.g., "1,2,5,10").
fn join_uids(uids: &[u32]) -> String {
    uids.iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> ImapConfig {
        ImapConfig {
            host: "imap.example.com".to_string(),
            port: 993,
            use_tls: true,
            username: "events@example.com".to_string(),
            password: None,
            password_file: None,
            password_env_var: Some("TEST_EMAIL_PASSWORD".to_string()),
            folder: "INBOX".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = ImapClient::new(create_test_config());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_tls_required() {
        let mut config = create_test_config();
        config.use_tls = false;

        let mut client = ImapClient::new(config);
        let result = client.connect().await;
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), EmailError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut config = create_test_config();
        config.password_env_var = Some("EVMAIL_TEST_NO_SUCH_VAR".to_string());

        let mut client = ImapClient::new(config);
        let result = client.connect().await;
        assert!(matches!(
            result.unwrap_err(),
            EmailError::CredentialsNotFound(_)
        ));
    }

    #[test]
    fn test_join_uids() {
        assert_eq!(join_uids(&[1, 2, 5, 10]), "1,2,5,10");
        assert_eq!(join_uids(&[42]), "42");
    }
}
