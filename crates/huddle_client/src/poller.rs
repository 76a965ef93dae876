//! Polling synchronizer.
//!
//! While the feed is mounted, a background task fetches the full message
//! list once immediately and then every poll interval. Each fetch is awaited
//! before the next tick is taken, so fetches from one loop never overlap.
//!
//! ```text
//!   Idle ──mount──▶ Active ──unmount──▶ Stopped
//!     │               │
//!     │ no credential │ credential rejected / cleared
//!     ▼               ▼
//!   Unauthenticated ◀─┘
//! ```

use crate::api::ChatApi;
use crate::feed::{ApplyOutcome, MessageFeedStore};
use crate::guard::{Guarded, SessionGuard};
use crate::transport::HttpTransport;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The current state of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No view is mounted.
    Idle,
    /// Mounted without a credential, or the credential was rejected.
    /// No fetches run until the view is remounted.
    Unauthenticated,
    /// The fetch loop is running.
    Active,
    /// The view was unmounted and the loop torn down.
    Stopped,
}

impl SyncState {
    /// Returns true if the fetch loop is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Active)
    }
}

/// Statistics about fetch cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Fetches sent.
    pub fetches_issued: u64,
    /// Snapshots that replaced the feed.
    pub snapshots_applied: u64,
    /// Snapshots dropped because a newer one was already applied.
    pub stale_snapshots: u64,
    /// Fetches that failed without invalidating the session.
    pub fetch_failures: u64,
    /// Last fetch error message.
    pub last_error: Option<String>,
    /// Time of the last applied snapshot.
    pub last_sync_time: Option<Instant>,
}

/// Result of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The snapshot replaced the feed.
    Applied,
    /// The snapshot was older than the feed and was dropped.
    Stale,
    /// The fetch failed; the loop keeps running.
    Failed,
    /// The credential was rejected; the loop must stop.
    Invalidated,
    /// The view went away before the response was applied.
    Detached,
}

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Shared<T: HttpTransport> {
    api: Arc<ChatApi<T>>,
    guard: Arc<SessionGuard>,
    feed: Arc<MessageFeedStore>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<T: HttpTransport> Shared<T> {
    fn set_state(&self, state: SyncState) {
        let mut current = self.state.write();
        if *current != state {
            debug!(from = ?*current, to = ?state, "Sync state change");
            *current = state;
        }
    }

    /// Fetches the message list and applies it to the feed.
    ///
    /// The response is dropped if the mount went away while it was in flight.
    async fn fetch_into_feed(&self, generation: u64) -> FetchOutcome {
        let Some(ticket) = self.feed.begin_fetch(generation) else {
            return FetchOutcome::Detached;
        };
        self.stats.write().fetches_issued += 1;

        let result = self.api.list_messages().await;

        if !self.feed.is_live(generation) {
            debug!(generation, "Dropping response for unmounted feed");
            return FetchOutcome::Detached;
        }

        match self.guard.inspect(result) {
            Guarded::Passed(messages) => match self.feed.apply_snapshot(ticket, messages) {
                ApplyOutcome::Applied => {
                    let mut stats = self.stats.write();
                    stats.snapshots_applied += 1;
                    stats.last_sync_time = Some(Instant::now());
                    stats.last_error = None;
                    FetchOutcome::Applied
                }
                ApplyOutcome::Stale => {
                    self.stats.write().stale_snapshots += 1;
                    FetchOutcome::Stale
                }
                ApplyOutcome::Detached => FetchOutcome::Detached,
            },
            Guarded::Failed(err) => {
                warn!(error = %err, "Feed fetch failed");
                self.feed.record_fetch_error(ticket, err.user_message());
                let mut stats = self.stats.write();
                stats.fetch_failures += 1;
                stats.last_error = Some(err.to_string());
                FetchOutcome::Failed
            }
            Guarded::Invalidated => {
                self.set_state(SyncState::Unauthenticated);
                FetchOutcome::Invalidated
            }
        }
    }
}

/// Owns the repeating fetch cycle for one feed view.
///
/// Every loop started by [`mount`](Self::mount) is stopped by
/// [`unmount`](Self::unmount), by remounting, or when the synchronizer is
/// dropped.
pub struct PollingSynchronizer<T: HttpTransport> {
    shared: Arc<Shared<T>>,
    interval: Duration,
    handle: Mutex<Option<LoopHandle>>,
}

impl<T: HttpTransport + 'static> PollingSynchronizer<T> {
    /// Creates an idle synchronizer.
    pub fn new(
        api: Arc<ChatApi<T>>,
        guard: Arc<SessionGuard>,
        feed: Arc<MessageFeedStore>,
        interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                guard,
                feed,
                state: RwLock::new(SyncState::Idle),
                stats: RwLock::new(SyncStats::default()),
            }),
            interval,
            handle: Mutex::new(None),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.shared.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Returns the feed this synchronizer writes to.
    pub fn feed(&self) -> &Arc<MessageFeedStore> {
        &self.shared.feed
    }

    /// Mounts the feed and starts polling.
    ///
    /// Without a stored credential nothing is fetched; the user is sent to
    /// login and the state becomes [`SyncState::Unauthenticated`]. Must be
    /// called from within a Tokio runtime.
    pub fn mount(&self) -> SyncState {
        self.stop_loop();

        if !self.shared.guard.require_authentication() {
            info!("No credential at mount, redirecting to login");
            self.shared.feed.detach();
            self.shared.set_state(SyncState::Unauthenticated);
            return SyncState::Unauthenticated;
        }

        let generation = self.shared.feed.attach();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            generation,
            self.interval,
            cancel.clone(),
        ));
        *self.handle.lock() = Some(LoopHandle { cancel, task });

        self.shared.set_state(SyncState::Active);
        info!(generation, interval_ms = self.interval.as_millis() as u64, "Polling started");
        SyncState::Active
    }

    /// Tears down the loop and discards the feed. Safe to call repeatedly.
    pub fn unmount(&self) {
        let stopped = self.stop_loop();
        self.shared.feed.detach();
        if stopped || self.state() != SyncState::Idle {
            self.shared.set_state(SyncState::Stopped);
        }
        if stopped {
            info!("Polling stopped");
        }
    }

    /// Stops the loop after the credential was rejected elsewhere.
    ///
    /// The feed stays attached until unmount.
    pub fn halt(&self) {
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.cancel.cancel();
        }
        self.shared.set_state(SyncState::Unauthenticated);
    }

    /// Runs one fetch outside the schedule. Does nothing unless active.
    pub async fn refresh(&self) -> FetchOutcome {
        if !self.state().is_active() {
            return FetchOutcome::Detached;
        }
        let generation = self.shared.feed.generation();
        let outcome = self.shared.fetch_into_feed(generation).await;
        if outcome == FetchOutcome::Invalidated {
            self.halt();
        }
        outcome
    }

    /// Returns true once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map_or(true, |handle| handle.task.is_finished())
    }

    fn stop_loop(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

impl<T: HttpTransport> Drop for PollingSynchronizer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.cancel.cancel();
        }
    }
}

async fn run_loop<T: HttpTransport>(
    shared: Arc<Shared<T>>,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !shared.guard.require_authentication() {
            info!("Credential cleared, stopping poll loop");
            shared.set_state(SyncState::Unauthenticated);
            break;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = shared.fetch_into_feed(generation) => outcome,
        };

        match outcome {
            FetchOutcome::Invalidated | FetchOutcome::Detached => break,
            FetchOutcome::Applied | FetchOutcome::Stale | FetchOutcome::Failed => {}
        }
    }

    debug!(generation, "Poll loop exited");
}
