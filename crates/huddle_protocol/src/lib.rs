//! # Huddle Protocol
//!
//! Wire types and endpoint contract for the Huddle group chat API.
//!
//! This crate provides:
//! - `Message` and `Member` records as the server returns them
//! - Request bodies for login, registration and message creation
//! - Endpoint paths and the `Authorization: Token <credential>` scheme
//! - Error body parsing (field errors and `detail` messages)
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod endpoints;
mod error;
mod messages;

pub use endpoints::{
    authorization_value, parse_authorization, Endpoint, Method, AUTHORIZATION_HEADER,
    AUTH_SCHEME,
};
pub use error::{ErrorBody, FieldError, ProtocolError, ProtocolResult};
pub use messages::{
    decode, encode, AuthResponse, CreateMessageRequest, CredentialsRequest, Member, Message,
    MessageId, MAX_USERNAME_LEN, MIN_PASSWORD_LEN,
};
