//! Endpoint paths and the token authorization scheme.

use std::fmt;

/// Name of the header carrying the credential.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Keyword preceding the credential in the authorization header.
pub const AUTH_SCHEME: &str = "Token";

/// HTTP method used by the chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read request.
    Get,
    /// Create/submit request.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A remote operation exposed by the chat server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `POST /api/members/register/`
    Register,
    /// `POST /api/members/login/`
    Login,
    /// `GET /api/members/me/`
    CurrentMember,
    /// `GET /api/chat/messages/`
    ListMessages,
    /// `POST /api/chat/messages/`
    CreateMessage,
}

impl Endpoint {
    /// Returns the request path.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Register => "/api/members/register/",
            Endpoint::Login => "/api/members/login/",
            Endpoint::CurrentMember => "/api/members/me/",
            Endpoint::ListMessages | Endpoint::CreateMessage => "/api/chat/messages/",
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        match self {
            Endpoint::CurrentMember | Endpoint::ListMessages => Method::Get,
            Endpoint::Register | Endpoint::Login | Endpoint::CreateMessage => Method::Post,
        }
    }

    /// Returns true for endpoints that are sent without a credential.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Endpoint::Register | Endpoint::Login)
    }

    /// Resolves a method and path back to an endpoint.
    pub fn resolve(method: Method, path: &str) -> Option<Self> {
        [
            Endpoint::Register,
            Endpoint::Login,
            Endpoint::CurrentMember,
            Endpoint::ListMessages,
            Endpoint::CreateMessage,
        ]
        .into_iter()
        .find(|e| e.method() == method && e.path() == path)
    }
}

/// Formats the authorization header value for a credential.
pub fn authorization_value(token: &str) -> String {
    format!("{AUTH_SCHEME} {token}")
}

/// Parses an authorization header value.
///
/// Returns `Ok(None)` when the header is absent or uses another scheme (the
/// request is then anonymous), `Ok(Some(token))` for a well-formed token
/// header, and `Err` for a malformed token header.
pub fn parse_authorization(header: Option<&str>) -> Result<Option<&str>, &'static str> {
    let parts: Vec<&str> = match header {
        Some(value) => value.split_whitespace().collect(),
        None => return Ok(None),
    };

    match parts.as_slice() {
        [] => Ok(None),
        [scheme, ..] if !scheme.eq_ignore_ascii_case(AUTH_SCHEME) => Ok(None),
        [_] => Err("Invalid authorization header. No credentials provided."),
        [_, token] => Ok(Some(*token)),
        _ => Err("Invalid authorization header. Token string should not contain spaces."),
    }
}
