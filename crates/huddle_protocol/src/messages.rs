//! Protocol records exchanged with the chat server.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Minimum accepted password length, enforced on registration.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Maximum accepted username length.
pub const MAX_USERNAME_LEN: usize = 150;

/// Server-assigned message identifier (totally ordered).
pub type MessageId = u64;

/// A chat message as returned by the server.
///
/// Messages are immutable once created. The server serializes the author as
/// `author_username`; `author` is accepted as an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier.
    pub id: MessageId,
    /// Display name of the author.
    #[serde(rename = "author_username", alias = "author")]
    pub author: String,
    /// Message content.
    pub text: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new message record.
    pub fn new(
        id: MessageId,
        author: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author: author.into(),
            text: text.into(),
            created_at,
        }
    }
}

/// A chat member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member ID.
    pub id: u64,
    /// Unique login name.
    pub username: String,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

/// Response to a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Opaque bearer token for subsequent requests.
    pub token: String,
    /// The authenticated member.
    pub member: Member,
}

/// Body for the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsRequest {
    /// Login name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl CredentialsRequest {
    /// Creates a new credentials body.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body for message creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    /// Message content.
    pub text: String,
}

impl CreateMessageRequest {
    /// Creates a new message body.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Encodes a protocol record as a JSON body.
pub fn encode<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodes a protocol record from a JSON body.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}
