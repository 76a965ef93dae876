//! Wiring of the client components.

use crate::api::ChatApi;
use crate::auth::AuthFlow;
use crate::client::AuthenticatedClient;
use crate::config::ClientConfig;
use crate::credential::CredentialStore;
use crate::error::ClientResult;
use crate::guard::SessionGuard;
use crate::http::ReqwestTransport;
use crate::navigation::{Navigator, Route};
use crate::session::ChatSession;
use crate::transport::HttpTransport;
use std::sync::Arc;

/// Shared handles for one client process.
///
/// Every component built from a context reads and writes the same
/// credential store and publishes to the same navigator.
pub struct ClientContext<T: HttpTransport> {
    config: ClientConfig,
    credentials: Arc<dyn CredentialStore>,
    navigator: Navigator,
    api: Arc<ChatApi<T>>,
    guard: Arc<SessionGuard>,
}

impl ClientContext<ReqwestTransport> {
    /// Creates a context talking to `config.base_url` over HTTP.
    pub fn connect(
        config: ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(config, transport, credentials))
    }
}

impl<T: HttpTransport + 'static> ClientContext<T> {
    /// Creates a context over an arbitrary transport.
    ///
    /// The navigator starts at the feed when a credential is stored and at
    /// login otherwise.
    pub fn new(config: ClientConfig, transport: T, credentials: Arc<dyn CredentialStore>) -> Self {
        let initial = if credentials.is_authenticated() {
            Route::Feed
        } else {
            Route::Login
        };
        let navigator = Navigator::new(initial);
        let client = AuthenticatedClient::new(transport, Arc::clone(&credentials));
        let api = Arc::new(ChatApi::new(client, &config));
        let guard = Arc::new(SessionGuard::new(Arc::clone(&credentials), navigator.clone()));
        Self {
            config,
            credentials,
            navigator,
            api,
            guard,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the credential store.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Returns the navigator.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Returns the typed API.
    pub fn api(&self) -> &Arc<ChatApi<T>> {
        &self.api
    }

    /// Returns the session guard.
    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.guard
    }

    /// Creates the auth flow.
    pub fn auth(&self) -> AuthFlow<T> {
        AuthFlow::new(
            Arc::clone(&self.api),
            Arc::clone(&self.guard),
            Arc::clone(&self.credentials),
            self.navigator.clone(),
        )
    }

    /// Creates an unmounted chat session polling at the configured interval.
    pub fn chat_session(&self) -> ChatSession<T> {
        ChatSession::new(
            Arc::clone(&self.api),
            Arc::clone(&self.guard),
            self.config.effective_poll_interval(),
        )
    }
}
