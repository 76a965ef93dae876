//! Configuration for the chat client.

use std::time::Duration;

/// Default interval between feed polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest poll interval the synchronizer will schedule.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g. "https://chat.example.com").
    pub base_url: String,
    /// Interval between feed polls while the feed is mounted.
    pub poll_interval: Duration,
    /// Request timeout. `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
    /// Treat HTTP 403 like 401 (credential rejected).
    pub forbidden_is_invalid_credential: bool,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: None,
            forbidden_is_invalid_credential: true,
            user_agent: format!("huddle/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets whether HTTP 403 invalidates the credential.
    pub fn with_forbidden_is_invalid_credential(mut self, enabled: bool) -> Self {
        self.forbidden_is_invalid_credential = enabled;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the poll interval actually scheduled (never zero).
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8000")
    }
}
