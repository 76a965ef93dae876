//! CLI command implementations.

pub mod auth;
pub mod send;
pub mod watch;

use chrono::Local;
use huddle_client::{
    ClientConfig, ClientContext, CredentialStore, FileCredentialStore, ReqwestTransport,
};
use huddle_protocol::Message;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type for command implementations.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const NOT_SIGNED_IN: &str = "Not signed in. Run `huddle login` first.";
const SESSION_EXPIRED: &str = "Your session has ended. Run `huddle login` again.";

/// Server address and credential file shared by every command.
pub struct Connection {
    server: String,
    credentials: Option<PathBuf>,
}

impl Connection {
    /// Creates a connection description.
    pub fn new(server: String, credentials: Option<PathBuf>) -> Self {
        Self {
            server,
            credentials,
        }
    }

    /// Returns the client configuration for this server.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.server.clone())
    }

    /// Returns the credential file path, falling back to the user config dir.
    pub fn credentials_path(&self) -> CliResult<PathBuf> {
        if let Some(path) = &self.credentials {
            return Ok(path.clone());
        }
        let dir = dirs::config_dir().ok_or("Cannot locate a config directory; pass --credentials")?;
        Ok(dir.join("huddle").join("credentials.json"))
    }

    /// Opens a client context with the default configuration.
    pub fn context(&self) -> CliResult<ClientContext<ReqwestTransport>> {
        self.context_with(self.config())
    }

    /// Opens a client context with `config`.
    pub fn context_with(&self, config: ClientConfig) -> CliResult<ClientContext<ReqwestTransport>> {
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::open(self.credentials_path()?)?);
        Ok(ClientContext::connect(config, store)?)
    }
}

/// Formats a message as one line of output.
pub fn format_message(message: &Message) -> String {
    let time = message.created_at.with_timezone(&Local).format("%H:%M:%S");
    format!("[{time}] {}: {}", message.author, message.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn explicit_credentials_path_wins() {
        let connection = Connection::new(
            "http://localhost:8000".into(),
            Some(PathBuf::from("/tmp/huddle.json")),
        );
        assert_eq!(
            connection.credentials_path().unwrap(),
            PathBuf::from("/tmp/huddle.json")
        );
        assert_eq!(connection.config().base_url, "http://localhost:8000");
    }

    #[test]
    fn context_reads_existing_credential() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, br#"{"authToken": "abc"}"#).unwrap();

        let connection = Connection::new("http://localhost:8000".into(), Some(path));
        let context = connection.context().unwrap();

        assert!(context.credentials().is_authenticated());
    }

    #[test]
    fn message_line_contains_author_and_text() {
        let message = Message::new(
            1,
            "alice",
            "hello there",
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        );
        let line = format_message(&message);
        assert!(line.ends_with("] alice: hello there"));
        assert!(line.starts_with('['));
    }
}
