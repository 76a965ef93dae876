//! # Huddle Client
//!
//! Session-aware synchronization engine for the Huddle group chat.
//!
//! This crate provides:
//! - Credential storage (in-memory and file-backed)
//! - A request client that attaches the credential to every call
//! - A session guard that signs the user out when the server rejects it
//! - A cancellable polling loop that keeps the message feed current
//! - Optimistic send with inline error reporting
//! - HTTP transport abstraction (reqwest, loopback, scripted mock)
//!
//! ## Architecture
//!
//! The feed is kept in sync by **polling**: one fetch on mount, then one
//! every interval until unmount. Each successful fetch replaces the feed
//! with the server snapshot. A successful send appends the server's copy
//! of the message immediately instead of waiting for the next poll.
//!
//! ## Key Invariants
//!
//! - A stored credential is the only signal of "authenticated"
//! - A rejected credential is cleared on both the poll and the send path
//! - No fetch is issued after unmount or after invalidation
//! - A snapshot never overwrites a fresher one
//! - Responses for an unmounted feed are dropped

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod auth;
mod client;
mod config;
mod context;
mod credential;
mod error;
mod feed;
mod guard;
mod http;
mod navigation;
mod poller;
mod session;
mod transport;

pub use api::ChatApi;
pub use auth::AuthFlow;
pub use client::AuthenticatedClient;
pub use config::{ClientConfig, DEFAULT_POLL_INTERVAL};
pub use context::ClientContext;
pub use credential::{
    Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, CREDENTIAL_KEY,
};
pub use error::{ClientError, ClientResult};
pub use feed::{ApplyOutcome, FeedState, FeedTicket, MessageFeedStore};
pub use guard::{Guarded, SessionGuard};
pub use http::{LoopbackServer, LoopbackTransport, ReqwestTransport};
pub use navigation::{Navigator, Route};
pub use poller::{FetchOutcome, PollingSynchronizer, SyncState, SyncStats};
pub use session::{ChatSession, SendOutcome};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, MockTransport};

pub use huddle_protocol::{Member, Message, MessageId};
