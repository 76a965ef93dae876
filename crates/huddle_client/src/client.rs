//! Credential-injecting request client.

use crate::credential::CredentialStore;
use crate::error::ClientResult;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use huddle_protocol::AUTHORIZATION_HEADER;
use std::sync::Arc;

/// Wraps a transport and attaches the stored credential to every request.
///
/// The credential is read from the store at dispatch time, never cached.
/// With no credential the request goes out unauthenticated; the server
/// decides what that means. Responses and transport failures are returned
/// unchanged.
pub struct AuthenticatedClient<T: HttpTransport> {
    transport: T,
    credentials: Arc<dyn CredentialStore>,
}

impl<T: HttpTransport> AuthenticatedClient<T> {
    /// Creates a new authenticated client.
    pub fn new(transport: T, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Returns the credential store this client reads from.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a GET request.
    pub async fn get(&self, path: &str) -> ClientResult<HttpResponse> {
        self.send(HttpRequest::get(path)).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: Vec<u8>) -> ClientResult<HttpResponse> {
        self.send(HttpRequest::post(path, body)).await
    }

    /// Sends a request without any credential. The store is not touched.
    pub async fn send_anonymous(&self, mut request: HttpRequest) -> ClientResult<HttpResponse> {
        request
            .headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
        self.transport.send(request).await
    }

    /// Sends a request, attaching `Authorization: Token <credential>` if a
    /// credential is stored.
    pub async fn send(&self, mut request: HttpRequest) -> ClientResult<HttpResponse> {
        if let Some(credential) = self.credentials.get() {
            request
                .headers
                .retain(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
            request = request.with_header(AUTHORIZATION_HEADER, credential.authorization_value());
        }
        self.transport.send(request).await
    }
}
