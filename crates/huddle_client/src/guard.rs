//! Session guard: the single place credential invalidation is handled.

use crate::credential::CredentialStore;
use crate::error::{ClientError, ClientResult};
use crate::navigation::{Navigator, Route};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Classified outcome of a guarded request.
#[derive(Debug)]
pub enum Guarded<T> {
    /// The request succeeded.
    Passed(T),
    /// The request failed for a reason other than the credential.
    Failed(ClientError),
    /// The credential was rejected. It has been cleared and the user sent
    /// back to login; the caller must drop the operation's other effects.
    Invalidated,
}

impl<T> Guarded<T> {
    /// Returns true if the credential was invalidated.
    pub fn is_invalidated(&self) -> bool {
        matches!(self, Guarded::Invalidated)
    }

    /// Converts back into a result. Invalidation maps to
    /// [`ClientError::NotAuthenticated`].
    pub fn into_result(self) -> ClientResult<T> {
        match self {
            Guarded::Passed(value) => Ok(value),
            Guarded::Failed(err) => Err(err),
            Guarded::Invalidated => Err(ClientError::NotAuthenticated),
        }
    }
}

/// Inspects request outcomes and runs the invalidation transition.
///
/// Poll and send paths go through the same guard so a rejected credential
/// is handled identically on both.
pub struct SessionGuard {
    credentials: Arc<dyn CredentialStore>,
    navigator: Navigator,
    invalidations: AtomicU64,
}

impl SessionGuard {
    /// Creates a guard over a credential store and navigator.
    pub fn new(credentials: Arc<dyn CredentialStore>, navigator: Navigator) -> Self {
        Self {
            credentials,
            navigator,
            invalidations: AtomicU64::new(0),
        }
    }

    /// Classifies `result`, invalidating the session on a rejected credential.
    pub fn inspect<T>(&self, result: ClientResult<T>) -> Guarded<T> {
        match result {
            Ok(value) => Guarded::Passed(value),
            Err(err) if err.is_invalid_credential() => {
                self.invalidate(&err);
                Guarded::Invalidated
            }
            Err(err) => Guarded::Failed(err),
        }
    }

    /// Sends the user to login if no credential is stored.
    ///
    /// Returns true if a credential is present.
    pub fn require_authentication(&self) -> bool {
        if self.credentials.is_authenticated() {
            return true;
        }
        self.navigator.navigate(Route::Login);
        false
    }

    /// Returns the navigator the guard redirects through.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Returns how many invalidation transitions have run.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn invalidate(&self, cause: &ClientError) {
        info!(error = %cause, "Credential rejected, signing out");
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear rejected credential");
        }
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.navigator.navigate(Route::Login);
    }
}
