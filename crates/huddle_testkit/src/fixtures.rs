//! Test fixtures and client helpers.
//!
//! Provides a client wired to a [`FakeChatServer`] over loopback, plus
//! helpers for messages and temporary credential files.

use crate::server::FakeChatServer;
use chrono::{TimeZone, Utc};
use huddle_client::{
    ClientConfig, ClientContext, Credential, CredentialStore, FileCredentialStore,
    LoopbackTransport, MemoryCredentialStore,
};
use huddle_protocol::{Message, MessageId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Password used by [`TestClient::signed_in`].
pub const TEST_PASSWORD: &str = "password";

/// Client context talking to a fake server.
pub type LoopbackContext = ClientContext<LoopbackTransport<Arc<FakeChatServer>>>;

/// A client context connected to a fake server, with an in-memory store.
pub struct TestClient {
    /// The server the client talks to.
    pub server: Arc<FakeChatServer>,
    /// The wired client.
    pub context: LoopbackContext,
    /// The credential store shared by every client component.
    pub credentials: Arc<MemoryCredentialStore>,
}

impl TestClient {
    /// Creates a signed-out client with the default configuration.
    pub fn new(server: Arc<FakeChatServer>) -> Self {
        Self::with_config(server, ClientConfig::default())
    }

    /// Creates a signed-out client with `config`.
    pub fn with_config(server: Arc<FakeChatServer>, config: ClientConfig) -> Self {
        Self::build(server, config, MemoryCredentialStore::new())
    }

    /// Registers `username` on the server and creates a client holding its token.
    pub fn signed_in(server: Arc<FakeChatServer>, username: &str) -> Self {
        let auth = server
            .register_member(username, TEST_PASSWORD)
            .expect("Failed to register test member");
        let credential = Credential::new(auth.token).expect("Server issued an empty token");
        Self::build(
            server,
            ClientConfig::default(),
            MemoryCredentialStore::with_credential(credential),
        )
    }

    fn build(
        server: Arc<FakeChatServer>,
        config: ClientConfig,
        store: MemoryCredentialStore,
    ) -> Self {
        let credentials = Arc::new(store);
        let transport = LoopbackTransport::new(Arc::clone(&server));
        let context = ClientContext::new(config, transport, credentials.clone());
        Self {
            server,
            context,
            credentials,
        }
    }

    /// Returns the stored token, if any.
    pub fn token(&self) -> Option<String> {
        self.credentials.get().map(|c| c.as_str().to_string())
    }
}

/// Creates a message with a deterministic timestamp.
pub fn sample_message(id: MessageId, author: &str, text: &str) -> Message {
    let created_at = Utc
        .timestamp_opt(1_700_000_000 + id as i64, 0)
        .single()
        .unwrap_or_default();
    Message::new(id, author, text, created_at)
}

/// A credential file in a temporary directory, removed on drop.
pub struct TempCredentials {
    _dir: TempDir,
    path: PathBuf,
}

impl TempCredentials {
    /// Creates a fresh directory. The file itself does not exist yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("huddle").join("credentials.json");
        Self { _dir: dir, path }
    }

    /// Returns the credential file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a store on the file.
    pub fn open(&self) -> FileCredentialStore {
        FileCredentialStore::open(&self.path).expect("Failed to open credential file")
    }
}

impl Default for TempCredentials {
    fn default() -> Self {
        Self::new()
    }
}
