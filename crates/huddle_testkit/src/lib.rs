//! # Huddle Testkit
//!
//! Test utilities for the Huddle chat client.
//!
//! This crate provides:
//! - An in-memory chat server with token revocation and fault injection
//! - Clients wired to that server over loopback
//! - Message and credential-file fixtures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use huddle_testkit::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn feed_loads() {
//!     let server = Arc::new(FakeChatServer::new());
//!     let client = TestClient::signed_in(server.clone(), "alice");
//!     let session = client.context.chat_session();
//!     session.mount();
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::server::*;
    pub use std::sync::Arc;
}

pub use fixtures::*;
pub use server::*;
