//! In-memory message feed.
//!
//! The feed is rebuilt from a full server snapshot on every successful poll
//! and extended locally when a send succeeds. Two guards keep it coherent:
//!
//! - **Generation**: each mount gets a fresh generation. Updates carrying an
//!   older generation, or arriving after detach, are dropped.
//! - **Sequence**: every fetch takes a ticket from a monotonic counter. A
//!   snapshot is applied only if its ticket is newer than the last applied
//!   one, so a slow response cannot overwrite a fresher feed.
//!
//! Locally appended messages stay visible until a snapshot requested after
//! the append has been applied. Messages are deduplicated by id.

use huddle_protocol::{Message, MessageId};
use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Render-facing feed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    /// Messages in server order, followed by unconfirmed local appends.
    pub feed: Vec<Message>,
    /// True until the first fetch of this mount completes.
    pub is_loading: bool,
    /// Inline error from the last failed fetch or send.
    pub error: Option<String>,
    /// True while at least one send is in flight.
    pub is_sending: bool,
}

/// A claim on one fetch, issued before the request goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedTicket {
    generation: u64,
    sequence: u64,
}

impl FeedTicket {
    /// Mount generation the fetch belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Issue order within the generation, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Result of offering a snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot replaced the feed.
    Applied,
    /// A newer snapshot was already applied.
    Stale,
    /// The feed was detached or remounted since the ticket was issued.
    Detached,
}

#[derive(Debug)]
struct Pending {
    id: MessageId,
    /// Last ticket issued when the message was appended.
    watermark: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorSource {
    Fetch,
    Send,
}

#[derive(Debug, Default)]
struct Inner {
    state: FeedState,
    generation: u64,
    live: bool,
    issued: u64,
    last_applied: u64,
    pending: Vec<Pending>,
    sends_in_flight: usize,
    error_source: Option<ErrorSource>,
}

impl Inner {
    fn accepts(&self, generation: u64) -> bool {
        self.live && self.generation == generation
    }

    fn set_error(&mut self, source: ErrorSource, message: String) {
        self.state.error = Some(message);
        self.error_source = Some(source);
    }

    /// Clears the inline error if it came from `source`.
    fn clear_error(&mut self, source: ErrorSource) -> bool {
        if self.error_source != Some(source) {
            return false;
        }
        self.state.error = None;
        self.error_source = None;
        true
    }
}

/// Owner of the feed state for the currently mounted view.
pub struct MessageFeedStore {
    inner: Mutex<Inner>,
    sender: watch::Sender<FeedState>,
}

impl MessageFeedStore {
    /// Creates a detached, empty store.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(FeedState::default());
        Self {
            inner: Mutex::new(Inner::default()),
            sender,
        }
    }

    /// Starts a new mount with an empty, loading feed. Returns its generation.
    pub fn attach(&self) -> u64 {
        let mut inner = self.inner.lock();
        let generation = inner.generation + 1;
        *inner = Inner {
            state: FeedState {
                is_loading: true,
                ..FeedState::default()
            },
            generation,
            live: true,
            ..Inner::default()
        };
        self.publish(&inner);
        debug!(generation, "Feed attached");
        generation
    }

    /// Discards the feed. Later updates for the old generation are ignored.
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        if !inner.live {
            return;
        }
        inner.live = false;
        inner.state = FeedState::default();
        inner.pending.clear();
        self.publish(&inner);
        debug!(generation = inner.generation, "Feed detached");
    }

    /// Returns true if `generation` is the live mount.
    pub fn is_live(&self, generation: u64) -> bool {
        self.inner.lock().accepts(generation)
    }

    /// Returns the generation of the current (or last) mount.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Issues a ticket for a fetch about to be sent.
    pub fn begin_fetch(&self, generation: u64) -> Option<FeedTicket> {
        let mut inner = self.inner.lock();
        if !inner.accepts(generation) {
            return None;
        }
        inner.issued += 1;
        Some(FeedTicket {
            generation,
            sequence: inner.issued,
        })
    }

    /// Replaces the feed with a snapshot and clears a previous fetch error.
    /// An error left by a failed send stays until the next send.
    ///
    /// Local appends made while the ticket's request was outstanding are
    /// kept after the snapshot unless it already contains them.
    pub fn apply_snapshot(&self, ticket: FeedTicket, snapshot: Vec<Message>) -> ApplyOutcome {
        let mut inner = self.inner.lock();
        if !inner.accepts(ticket.generation) {
            return ApplyOutcome::Detached;
        }
        if ticket.sequence <= inner.last_applied {
            debug!(
                sequence = ticket.sequence,
                last_applied = inner.last_applied,
                "Ignoring stale snapshot"
            );
            return ApplyOutcome::Stale;
        }

        let snapshot_ids: HashSet<MessageId> = snapshot.iter().map(|m| m.id).collect();
        let carried: Vec<Message> = inner
            .pending
            .iter()
            .filter(|p| p.watermark >= ticket.sequence && !snapshot_ids.contains(&p.id))
            .filter_map(|p| inner.state.feed.iter().find(|m| m.id == p.id).cloned())
            .collect();
        inner
            .pending
            .retain(|p| p.watermark >= ticket.sequence && !snapshot_ids.contains(&p.id));

        let mut feed = snapshot;
        feed.extend(carried);
        trace!(sequence = ticket.sequence, len = feed.len(), "Snapshot applied");

        inner.last_applied = ticket.sequence;
        inner.state.feed = feed;
        inner.state.is_loading = false;
        inner.clear_error(ErrorSource::Fetch);
        self.publish(&inner);
        ApplyOutcome::Applied
    }

    /// Records a failed fetch. The feed is left as it is.
    pub fn record_fetch_error(&self, ticket: FeedTicket, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        if !inner.accepts(ticket.generation) || ticket.sequence < inner.last_applied {
            return;
        }
        inner.state.is_loading = false;
        inner.set_error(ErrorSource::Fetch, message.into());
        self.publish(&inner);
    }

    /// Appends a server-confirmed message. Returns false if it was dropped
    /// because the mount is gone or the id is already in the feed.
    pub fn append(&self, generation: u64, message: Message) -> bool {
        let mut inner = self.inner.lock();
        if !inner.accepts(generation) {
            return false;
        }
        if inner.state.feed.iter().any(|m| m.id == message.id) {
            return false;
        }
        let watermark = inner.issued;
        inner.pending.push(Pending {
            id: message.id,
            watermark,
        });
        inner.state.feed.push(message);
        self.publish(&inner);
        true
    }

    /// Marks a send as started. `is_sending` stays raised until every
    /// started send has ended.
    pub fn begin_send(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.accepts(generation) {
            inner.sends_in_flight += 1;
            self.update_sending(&mut inner);
        }
    }

    /// Marks a send started with [`MessageFeedStore::begin_send`] as ended.
    pub fn end_send(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.accepts(generation) {
            inner.sends_in_flight = inner.sends_in_flight.saturating_sub(1);
            self.update_sending(&mut inner);
        }
    }

    /// Shows an inline error for a failed send.
    pub fn record_send_error(&self, generation: u64, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.accepts(generation) {
            inner.set_error(ErrorSource::Send, message.into());
            self.publish(&inner);
        }
    }

    /// Clears the inline error left by a failed send, if any.
    pub fn clear_send_error(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.accepts(generation) && inner.clear_error(ErrorSource::Send) {
            self.publish(&inner);
        }
    }

    /// Returns a copy of the current state.
    pub fn state(&self) -> FeedState {
        self.inner.lock().state.clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.sender.subscribe()
    }

    fn update_sending(&self, inner: &mut Inner) {
        let is_sending = inner.sends_in_flight > 0;
        if inner.state.is_sending != is_sending {
            inner.state.is_sending = is_sending;
            self.publish(inner);
        }
    }

    fn publish(&self, inner: &Inner) {
        self.sender.send_replace(inner.state.clone());
    }
}

impl Default for MessageFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn message(id: MessageId) -> Message {
        Message::new(
            id,
            "alice",
            format!("message {id}"),
            Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
        )
    }

    fn messages(ids: &[MessageId]) -> Vec<Message> {
        ids.iter().copied().map(message).collect()
    }

    fn ids(state: &FeedState) -> Vec<MessageId> {
        state.feed.iter().map(|m| m.id).collect()
    }

    #[test]
    fn attach_starts_loading() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        let state = store.state();
        assert!(state.is_loading);
        assert!(state.feed.is_empty());
        assert!(store.is_live(generation));
    }

    #[test]
    fn snapshot_replaces_feed() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1, 2, 3]));
        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[2, 3, 4]));

        let state = store.state();
        assert_eq!(ids(&state), vec![2, 3, 4]);
        assert!(!state.is_loading);
    }

    #[test]
    fn older_snapshot_is_ignored() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        let first = store.begin_fetch(generation).unwrap();
        let second = store.begin_fetch(generation).unwrap();

        assert_eq!(
            store.apply_snapshot(second, messages(&[1, 2])),
            ApplyOutcome::Applied
        );
        assert_eq!(
            store.apply_snapshot(first, messages(&[1])),
            ApplyOutcome::Stale
        );
        assert_eq!(ids(&store.state()), vec![1, 2]);
    }

    #[test]
    fn error_from_older_fetch_is_ignored() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        let first = store.begin_fetch(generation).unwrap();
        let second = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(second, messages(&[1]));
        store.record_fetch_error(first, "Failed to load messages.");

        assert!(store.state().error.is_none());
    }

    #[test]
    fn fetch_error_keeps_feed() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1]));
        let ticket = store.begin_fetch(generation).unwrap();
        store.record_fetch_error(ticket, "Failed to load messages.");

        let state = store.state();
        assert_eq!(ids(&state), vec![1]);
        assert_eq!(state.error.as_deref(), Some("Failed to load messages."));

        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1]));
        assert!(store.state().error.is_none());
    }

    #[test]
    fn updates_after_detach_are_dropped() {
        let store = MessageFeedStore::new();
        let generation = store.attach();
        let ticket = store.begin_fetch(generation).unwrap();

        store.detach();

        assert_eq!(
            store.apply_snapshot(ticket, messages(&[1])),
            ApplyOutcome::Detached
        );
        assert!(!store.append(generation, message(2)));
        assert!(store.begin_fetch(generation).is_none());
        assert_eq!(store.state(), FeedState::default());
    }

    #[test]
    fn remount_invalidates_old_generation() {
        let store = MessageFeedStore::new();
        let old = store.attach();
        let ticket = store.begin_fetch(old).unwrap();
        let new = store.attach();

        assert_ne!(old, new);
        assert_eq!(
            store.apply_snapshot(ticket, messages(&[1])),
            ApplyOutcome::Detached
        );
        assert!(store.state().feed.is_empty());
    }

    #[test]
    fn append_is_visible_and_deduplicated() {
        let store = MessageFeedStore::new();
        let generation = store.attach();
        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1, 2]));

        assert!(store.append(generation, message(3)));
        assert!(!store.append(generation, message(3)));
        assert!(!store.append(generation, message(1)));

        assert_eq!(ids(&store.state()), vec![1, 2, 3]);
    }

    #[test]
    fn append_survives_snapshot_requested_before_it() {
        let store = MessageFeedStore::new();
        let generation = store.attach();
        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1]));

        let in_flight = store.begin_fetch(generation).unwrap();
        store.append(generation, message(5));
        store.apply_snapshot(in_flight, messages(&[1, 2]));
        assert_eq!(ids(&store.state()), vec![1, 2, 5]);

        let next = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(next, messages(&[1, 2, 5]));
        assert_eq!(ids(&store.state()), vec![1, 2, 5]);
    }

    #[test]
    fn snapshot_requested_after_append_is_authoritative() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        store.append(generation, message(7));
        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1]));

        assert_eq!(ids(&store.state()), vec![1]);
    }

    #[test]
    fn sending_flag_is_published() {
        let store = MessageFeedStore::new();
        let generation = store.attach();
        let rx = store.subscribe();

        store.begin_send(generation);
        assert!(rx.borrow().is_sending);
        store.end_send(generation);
        assert!(!rx.borrow().is_sending);
    }

    #[test]
    fn sending_flag_waits_for_every_send() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        store.begin_send(generation);
        store.begin_send(generation);
        store.end_send(generation);
        assert!(store.state().is_sending);

        store.end_send(generation);
        assert!(!store.state().is_sending);

        store.end_send(generation);
        assert!(!store.state().is_sending);
    }

    #[test]
    fn snapshot_keeps_send_error() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        store.record_send_error(generation, "Failed to send the message.");
        let ticket = store.begin_fetch(generation).unwrap();
        store.apply_snapshot(ticket, messages(&[1]));
        assert_eq!(
            store.state().error.as_deref(),
            Some("Failed to send the message.")
        );

        store.clear_send_error(generation);
        assert!(store.state().error.is_none());
    }

    #[test]
    fn send_success_keeps_fetch_error() {
        let store = MessageFeedStore::new();
        let generation = store.attach();

        let ticket = store.begin_fetch(generation).unwrap();
        store.record_fetch_error(ticket, "Failed to load messages.");
        store.clear_send_error(generation);

        assert_eq!(
            store.state().error.as_deref(),
            Some("Failed to load messages.")
        );
    }

    proptest! {
        #[test]
        fn feed_equals_last_applied_snapshot(
            snapshots in prop::collection::vec(
                prop::collection::btree_set(0u64..50, 0..10),
                1..8,
            )
        ) {
            let store = MessageFeedStore::new();
            let generation = store.attach();

            for snapshot in &snapshots {
                let ticket = store.begin_fetch(generation).unwrap();
                let snapshot: Vec<MessageId> = snapshot.iter().copied().collect();
                store.apply_snapshot(ticket, messages(&snapshot));
                prop_assert_eq!(ids(&store.state()), snapshot);
            }
        }
    }
}
