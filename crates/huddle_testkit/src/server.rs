//! In-memory chat server speaking the Huddle HTTP contract.
//!
//! [`FakeChatServer`] plugs into [`LoopbackTransport`](huddle_client::LoopbackTransport)
//! so client flows can run end to end without sockets. Besides the regular
//! endpoints it lets tests revoke tokens, inject one-shot failures and count
//! requests per endpoint.

use chrono::Utc;
use huddle_client::{HttpRequest, HttpResponse, LoopbackServer};
use huddle_protocol::{
    decode, parse_authorization, AuthResponse, CreateMessageRequest, CredentialsRequest,
    Endpoint, ErrorBody, Member, Message, MessageId, AUTHORIZATION_HEADER, MAX_USERNAME_LEN,
    MIN_PASSWORD_LEN,
};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredMember {
    member: Member,
    password: String,
}

#[derive(Debug, Default)]
struct ServerState {
    members: Vec<StoredMember>,
    /// Token -> member id.
    tokens: HashMap<String, u64>,
    messages: Vec<Message>,
    next_member_id: u64,
    next_message_id: MessageId,
    faults: HashMap<Endpoint, VecDeque<u16>>,
    requests: HashMap<Endpoint, usize>,
}

impl ServerState {
    fn member_by_name(&self, username: &str) -> Option<&StoredMember> {
        self.members.iter().find(|m| m.member.username == username)
    }

    fn member_by_id(&self, id: u64) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.member.id == id)
            .map(|m| &m.member)
    }

    /// Returns the member's token, issuing one if they have none.
    fn token_for(&mut self, member_id: u64) -> String {
        if let Some((token, _)) = self.tokens.iter().find(|(_, id)| **id == member_id) {
            return token.clone();
        }
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), member_id);
        token
    }
}

/// Rejection raised while handling a request.
type Rejection = (u16, ErrorBody);

/// A fake chat server with in-memory state.
#[derive(Debug)]
pub struct FakeChatServer {
    state: RwLock<ServerState>,
    rejection_status: u16,
}

impl FakeChatServer {
    /// Creates an empty server that rejects bad credentials with 401.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ServerState {
                next_member_id: 1,
                next_message_id: 1,
                ..ServerState::default()
            }),
            rejection_status: 401,
        }
    }

    /// Sets the status used to reject missing or unknown tokens.
    ///
    /// Django-style token authentication without a challenge header answers
    /// with 403.
    pub fn with_rejection_status(mut self, status: u16) -> Self {
        self.rejection_status = status;
        self
    }

    /// Registers a member directly, bypassing HTTP.
    pub fn register_member(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, ErrorBody> {
        self.register(&CredentialsRequest::new(username, password))
            .map_err(|(_, body)| body)
    }

    /// Posts a message as `author`, bypassing HTTP.
    ///
    /// The author does not have to be a registered member.
    pub fn post_message(&self, author: &str, text: &str) -> Message {
        let mut state = self.state.write();
        let message = Message::new(state.next_message_id, author, text, Utc::now());
        state.next_message_id += 1;
        state.messages.push(message.clone());
        message
    }

    /// Returns all messages in feed order.
    pub fn messages(&self) -> Vec<Message> {
        self.state.read().messages.clone()
    }

    /// Invalidates a token. Returns false if it was unknown.
    pub fn revoke_token(&self, token: &str) -> bool {
        self.state.write().tokens.remove(token).is_some()
    }

    /// Invalidates every token.
    pub fn revoke_all_tokens(&self) {
        self.state.write().tokens.clear();
    }

    /// Makes the next request to `endpoint` fail with `status`.
    pub fn fail_next(&self, endpoint: Endpoint, status: u16) {
        self.state
            .write()
            .faults
            .entry(endpoint)
            .or_default()
            .push_back(status);
    }

    /// Returns the number of requests received for `endpoint`.
    pub fn request_count(&self, endpoint: Endpoint) -> usize {
        self.state
            .read()
            .requests
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }

    fn register(&self, request: &CredentialsRequest) -> Result<AuthResponse, Rejection> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(field_error("username", "This field may not be blank."));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(field_error(
                "username",
                format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters."),
            ));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(field_error(
                "password",
                format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
            ));
        }

        let mut state = self.state.write();
        if state.member_by_name(username).is_some() {
            return Err(field_error(
                "username",
                "A member with that username already exists.",
            ));
        }

        let member = Member {
            id: state.next_member_id,
            username: username.to_string(),
            created_at: Utc::now(),
        };
        state.next_member_id += 1;
        state.members.push(StoredMember {
            member: member.clone(),
            password: request.password.clone(),
        });
        let token = state.token_for(member.id);
        debug!(username, "Member registered");

        Ok(AuthResponse { token, member })
    }

    fn login(&self, request: &CredentialsRequest) -> Result<AuthResponse, Rejection> {
        let mut state = self.state.write();
        let member = match state.member_by_name(&request.username) {
            Some(stored) if stored.password == request.password => stored.member.clone(),
            _ => {
                return Err((
                    400,
                    ErrorBody::detail("Invalid username or password."),
                ))
            }
        };
        let token = state.token_for(member.id);
        Ok(AuthResponse { token, member })
    }

    fn authenticate(&self, request: &HttpRequest) -> Result<Member, Rejection> {
        let reject = |message: &str| (self.rejection_status, ErrorBody::detail(message));

        let token = match parse_authorization(request.header(AUTHORIZATION_HEADER)) {
            Ok(Some(token)) => token,
            Ok(None) => return Err(reject("Authentication credentials were not provided.")),
            Err(message) => return Err(reject(message)),
        };

        let state = self.state.read();
        let member = state
            .tokens
            .get(token)
            .and_then(|id| state.member_by_id(*id))
            .cloned();
        member.ok_or_else(|| reject("Invalid or expired token."))
    }

    fn create_message(
        &self,
        author: &Member,
        request: &CreateMessageRequest,
    ) -> Result<Message, Rejection> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(field_error("text", "This field may not be blank."));
        }
        let mut state = self.state.write();
        let message = Message::new(state.next_message_id, &author.username, text, Utc::now());
        state.next_message_id += 1;
        state.messages.push(message.clone());
        Ok(message)
    }

    fn route(&self, endpoint: Endpoint, request: &HttpRequest) -> Result<HttpResponse, Rejection> {
        match endpoint {
            Endpoint::Register => {
                let body = decode_body::<CredentialsRequest>(request)?;
                Ok(HttpResponse::json(201, &self.register(&body)?))
            }
            Endpoint::Login => {
                let body = decode_body::<CredentialsRequest>(request)?;
                Ok(HttpResponse::json(200, &self.login(&body)?))
            }
            Endpoint::CurrentMember => {
                let member = self.authenticate(request)?;
                Ok(HttpResponse::json(200, &member))
            }
            Endpoint::ListMessages => {
                self.authenticate(request)?;
                Ok(HttpResponse::json(200, &self.messages()))
            }
            Endpoint::CreateMessage => {
                let member = self.authenticate(request)?;
                let body = decode_body::<CreateMessageRequest>(request)?;
                Ok(HttpResponse::json(201, &self.create_message(&member, &body)?))
            }
        }
    }
}

impl Default for FakeChatServer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackServer for FakeChatServer {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let Some(endpoint) = Endpoint::resolve(request.method, &request.path) else {
            return HttpResponse::json(404, &json!({"detail": "Not found."}));
        };

        let fault = {
            let mut state = self.state.write();
            *state.requests.entry(endpoint).or_insert(0) += 1;
            state.faults.get_mut(&endpoint).and_then(VecDeque::pop_front)
        };
        if let Some(status) = fault {
            debug!(?endpoint, status, "Injected failure");
            return HttpResponse::new(status, ErrorBody::detail("Injected failure.").to_bytes());
        }

        match self.route(endpoint, request) {
            Ok(response) => response,
            Err((status, body)) => HttpResponse::new(status, body.to_bytes()),
        }
    }
}

fn field_error(field: &str, message: impl Into<String>) -> Rejection {
    (400, ErrorBody::field(field, message))
}

fn decode_body<T: serde::de::DeserializeOwned>(request: &HttpRequest) -> Result<T, Rejection> {
    let body = request.body.as_deref().unwrap_or_default();
    decode(body).map_err(|e| (400, ErrorBody::detail(format!("Malformed request body: {e}"))))
}
