//! Chat session: the feed view's engine.
//!
//! A [`ChatSession`] bundles the polling synchronizer with the send path and
//! exposes the state the rendering layer draws.

use crate::api::ChatApi;
use crate::feed::{FeedState, MessageFeedStore};
use crate::guard::{Guarded, SessionGuard};
use crate::poller::{FetchOutcome, PollingSynchronizer, SyncState, SyncStats};
use crate::transport::HttpTransport;
use huddle_protocol::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Result of submitting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The text was empty after trimming. Nothing was sent.
    Empty,
    /// The server accepted the message; it is already in the feed.
    Sent(Message),
    /// The send failed. The feed is unchanged and the input should be kept.
    Failed(String),
    /// The credential was rejected. The input should be discarded.
    SignedOut,
}

impl SendOutcome {
    /// Returns true if the input field should keep its text.
    pub fn keeps_input(&self) -> bool {
        matches!(self, SendOutcome::Failed(_))
    }
}

/// Engine behind one feed view.
pub struct ChatSession<T: HttpTransport> {
    api: Arc<ChatApi<T>>,
    guard: Arc<SessionGuard>,
    feed: Arc<MessageFeedStore>,
    synchronizer: PollingSynchronizer<T>,
}

impl<T: HttpTransport + 'static> ChatSession<T> {
    /// Creates an unmounted session.
    pub fn new(api: Arc<ChatApi<T>>, guard: Arc<SessionGuard>, poll_interval: Duration) -> Self {
        let feed = Arc::new(MessageFeedStore::new());
        let synchronizer = PollingSynchronizer::new(
            Arc::clone(&api),
            Arc::clone(&guard),
            Arc::clone(&feed),
            poll_interval,
        );
        Self {
            api,
            guard,
            feed,
            synchronizer,
        }
    }

    /// Mounts the view. See [`PollingSynchronizer::mount`].
    pub fn mount(&self) -> SyncState {
        self.synchronizer.mount()
    }

    /// Unmounts the view, stopping the poll loop and discarding the feed.
    pub fn unmount(&self) {
        self.synchronizer.unmount();
    }

    /// Returns a copy of the render state.
    pub fn state(&self) -> FeedState {
        self.feed.state()
    }

    /// Subscribes to render state changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.feed.subscribe()
    }

    /// Returns the synchronizer state.
    pub fn sync_state(&self) -> SyncState {
        self.synchronizer.state()
    }

    /// Returns fetch statistics.
    pub fn stats(&self) -> SyncStats {
        self.synchronizer.stats()
    }

    /// Fetches the feed now instead of waiting for the next tick.
    pub async fn refresh(&self) -> FetchOutcome {
        self.synchronizer.refresh().await
    }

    /// Sends a message and appends the server's copy to the feed.
    ///
    /// Whitespace-only text is rejected without a request. On failure the
    /// feed is left untouched and an inline error is set.
    pub async fn submit_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }

        let generation = self.feed.generation();
        self.feed.begin_send(generation);
        let result = self.api.create_message(text).await;
        self.feed.end_send(generation);

        match self.guard.inspect(result) {
            Guarded::Passed(message) => {
                debug!(id = message.id, "Message sent");
                self.feed.clear_send_error(generation);
                self.feed.append(generation, message.clone());
                SendOutcome::Sent(message)
            }
            Guarded::Failed(err) => {
                warn!(error = %err, "Send failed");
                let message = err.user_message();
                self.feed.record_send_error(generation, message.clone());
                SendOutcome::Failed(message)
            }
            Guarded::Invalidated => {
                self.synchronizer.halt();
                SendOutcome::SignedOut
            }
        }
    }
}
