//! HTTP transport implementations.
//!
//! [`ReqwestTransport`] talks to a real server. [`LoopbackTransport`] routes
//! requests straight into an in-process [`LoopbackServer`], which keeps tests
//! free of sockets.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use huddle_protocol::Method;
use std::sync::Arc;
use tracing::debug;

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// Base URL without a trailing slash.
    base_url: String,
    /// Shared connection pool.
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport from the client configuration.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            ClientError::transport_fatal(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                ClientError::transport_fatal(format!("invalid request to {url}: {e}"))
            } else {
                ClientError::transport_retryable(format!("{} {url} failed: {e}", request.method))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport_retryable(format!("failed to read body: {e}")))?;

        debug!(method = %request.method, path = %request.path, status, "HTTP response");
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request and returns the response.
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

/// A transport that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackTransport<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackTransport<S> {
    /// Creates a new loopback transport connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the connected server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpTransport for LoopbackTransport<S> {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        // Yield so callers observe the same suspension point as a real request.
        tokio::task::yield_now().await;
        Ok(self.server.handle(&request))
    }
}
