//! Error types for the chat client.

use huddle_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the chat server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server rejected the credential (401, or 403 when configured).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server failed or answered with an unexpected status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Human-readable message.
        message: String,
    },

    /// Input rejected before any request was sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// Input rejected by the server.
    #[error("rejected by server: {message}")]
    ServerValidation {
        /// Offending field, if the server named one.
        field: Option<String>,
        /// Human-readable message.
        message: String,
    },

    /// Response body did not match the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Credential storage failed.
    #[error("credential storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation required a credential and none is stored.
    #[error("not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error means the credential is no longer valid.
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, ClientError::InvalidCredential(_))
    }

    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns the message shown inline to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::InvalidCredential(_) | ClientError::NotAuthenticated => {
                "Your session has ended. Please sign in again.".to_string()
            }
            ClientError::Transport { .. } => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Server { message, .. } => message.clone(),
            ClientError::Validation(message) => message.clone(),
            ClientError::ServerValidation { message, .. } => message.clone(),
            ClientError::Protocol(_) => "The server sent an unexpected response.".to_string(),
            ClientError::Storage(_) | ClientError::Io(_) => {
                "Could not access the saved session.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ClientError::transport_retryable("connection reset").is_retryable());
        assert!(!ClientError::transport_fatal("bad url").is_retryable());
        assert!(ClientError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!ClientError::Server {
            status: 404,
            message: "missing".into()
        }
        .is_retryable());
        assert!(!ClientError::InvalidCredential("expired".into()).is_retryable());
    }

    #[test]
    fn credential_errors_are_classified() {
        assert!(ClientError::InvalidCredential("expired".into()).is_invalid_credential());
        assert!(!ClientError::NotAuthenticated.is_invalid_credential());
        assert!(!ClientError::Validation("empty".into()).is_invalid_credential());
    }

    #[test]
    fn user_messages() {
        let err = ClientError::ServerValidation {
            field: Some("username".into()),
            message: "A member with that username already exists.".into(),
        };
        assert_eq!(
            err.user_message(),
            "A member with that username already exists."
        );

        let err = ClientError::transport_retryable("dns failure");
        assert!(!err.user_message().contains("dns"));
    }
}
