//! Transport layer abstraction.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use huddle_protocol::Method;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// An outbound HTTP request, relative to the server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Path including the leading slash.
    pub path: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up a header value (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with a JSON-encoded body.
    pub fn json<T: serde::Serialize>(status: u16, value: &T) -> Self {
        Self::new(status, serde_json::to_vec(value).unwrap_or_default())
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An HTTP transport sends requests to the chat server.
///
/// This trait abstracts the network layer so the engine can run against
/// reqwest, an in-process server, or a scripted mock.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and returns the response, whatever its status.
    ///
    /// Errors are reserved for failures to obtain a response at all.
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        (**self).send(request).await
    }
}

type Route = (Method, String);

/// A scripted transport for testing.
///
/// One-shot responses queued with [`MockTransport::push_response`] are
/// served first; afterwards the sticky response set with
/// [`MockTransport::set_response`] is repeated.
#[derive(Debug, Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<Route, VecDeque<Result<HttpResponse, String>>>>,
    sticky: Mutex<HashMap<Route, Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Creates a new mock transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response repeated for every request to `method path`.
    pub fn set_response(&self, method: Method, path: &str, response: HttpResponse) {
        self.sticky
            .lock()
            .insert((method, path.to_string()), Ok(response));
    }

    /// Makes every request to `method path` fail at the transport level.
    pub fn set_failure(&self, method: Method, path: &str, message: &str) {
        self.sticky
            .lock()
            .insert((method, path.to_string()), Err(message.to_string()));
    }

    /// Queues a response served once, before any sticky response.
    pub fn push_response(&self, method: Method, path: &str, response: HttpResponse) {
        self.queued
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Ok(response));
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests sent to `method path`.
    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next_response(&self, route: &Route) -> Option<Result<HttpResponse, String>> {
        if let Some(response) = self
            .queued
            .lock()
            .get_mut(route)
            .and_then(VecDeque::pop_front)
        {
            return Some(response);
        }
        self.sticky.lock().get(route).cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let route = (request.method, request.path.clone());
        self.requests.lock().push(request);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_response(&route) {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ClientError::transport_retryable(message)),
            None => Err(ClientError::transport_fatal(format!(
                "no mock response for {} {}",
                route.0, route.1
            ))),
        }
    }
}
