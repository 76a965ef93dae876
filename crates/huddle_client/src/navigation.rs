//! Navigation signal between the engine and the rendering layer.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A surface the rendering layer can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The shared message feed.
    Feed,
    /// The login form.
    Login,
    /// The registration form.
    Register,
}

impl Route {
    /// Returns true for surfaces shown to signed-out users.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Feed => write!(f, "feed"),
            Route::Login => write!(f, "login"),
            Route::Register => write!(f, "register"),
        }
    }
}

/// Publishes the current route. Cheap to clone; clones share the channel.
#[derive(Debug, Clone)]
pub struct Navigator {
    sender: Arc<watch::Sender<Route>>,
}

impl Navigator {
    /// Creates a navigator starting at `initial`.
    pub fn new(initial: Route) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Moves to `route`. Subscribers are notified even if the route is unchanged.
    pub fn navigate(&self, route: Route) {
        debug!(%route, "Navigating");
        self.sender.send_replace(route);
    }

    /// Returns the current route.
    pub fn current(&self) -> Route {
        *self.sender.borrow()
    }

    /// Subscribes to route changes.
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.sender.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}
