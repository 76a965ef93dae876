//! Typed chat API on top of the authenticated client.
//!
//! Every operation decodes a successful body into its protocol record and
//! turns any other status into a [`ClientError`]:
//!
//! | status | error |
//! |---|---|
//! | 401 | `InvalidCredential` |
//! | 403 | `InvalidCredential` if configured, else `Server` |
//! | 400 | `ServerValidation` (first field error, else detail, else generic) |
//! | other | `Server` |

use crate::client::AuthenticatedClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use huddle_protocol::{
    decode, encode, AuthResponse, CreateMessageRequest, CredentialsRequest, Endpoint, ErrorBody,
    Member, Message, Method,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The remote operations of the chat server.
pub struct ChatApi<T: HttpTransport> {
    client: AuthenticatedClient<T>,
    forbidden_is_invalid_credential: bool,
}

impl<T: HttpTransport> ChatApi<T> {
    /// Creates a new API over an authenticated client.
    pub fn new(client: AuthenticatedClient<T>, config: &ClientConfig) -> Self {
        Self {
            client,
            forbidden_is_invalid_credential: config.forbidden_is_invalid_credential,
        }
    }

    /// Returns the underlying authenticated client.
    pub fn client(&self) -> &AuthenticatedClient<T> {
        &self.client
    }

    /// Registers a new member. Returns the session token and member.
    pub async fn register(&self, request: &CredentialsRequest) -> ClientResult<AuthResponse> {
        self.call(Endpoint::Register, Some(request)).await
    }

    /// Logs in an existing member. Returns the session token and member.
    pub async fn login(&self, request: &CredentialsRequest) -> ClientResult<AuthResponse> {
        self.call(Endpoint::Login, Some(request)).await
    }

    /// Fetches the member owning the current credential.
    pub async fn current_member(&self) -> ClientResult<Member> {
        self.call::<(), _>(Endpoint::CurrentMember, None).await
    }

    /// Fetches the full message feed in server order.
    pub async fn list_messages(&self) -> ClientResult<Vec<Message>> {
        self.call::<(), _>(Endpoint::ListMessages, None).await
    }

    /// Creates a message and returns the server-canonical record.
    pub async fn create_message(&self, text: &str) -> ClientResult<Message> {
        self.call(Endpoint::CreateMessage, Some(&CreateMessageRequest::new(text)))
            .await
    }

    async fn call<Req, Res>(&self, endpoint: Endpoint, body: Option<&Req>) -> ClientResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let request = match endpoint.method() {
            Method::Get => HttpRequest::get(endpoint.path()),
            Method::Post => {
                let body = match body {
                    Some(body) => encode(body)?,
                    None => b"{}".to_vec(),
                };
                HttpRequest::post(endpoint.path(), body)
            }
        };
        let response = if endpoint.is_anonymous() {
            self.client.send_anonymous(request).await?
        } else {
            self.client.send(request).await?
        };

        if response.is_success() {
            Ok(decode(&response.body)?)
        } else {
            Err(self.classify(endpoint, &response))
        }
    }

    fn classify(&self, endpoint: Endpoint, response: &HttpResponse) -> ClientError {
        let body = ErrorBody::parse(&response.body);
        let detail = body.as_ref().and_then(|b| b.detail.clone());

        match response.status {
            401 => ClientError::InvalidCredential(
                detail.unwrap_or_else(|| "credential rejected".into()),
            ),
            403 if self.forbidden_is_invalid_credential => ClientError::InvalidCredential(
                detail.unwrap_or_else(|| "credential rejected".into()),
            ),
            400 => match body.and_then(|b| b.first_error()) {
                Some(error) => ClientError::ServerValidation {
                    field: error.field,
                    message: error.message,
                },
                None => ClientError::ServerValidation {
                    field: None,
                    message: generic_failure(endpoint).into(),
                },
            },
            status => ClientError::Server {
                status,
                message: detail.unwrap_or_else(|| generic_failure(endpoint).into()),
            },
        }
    }
}

fn generic_failure(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::Register => "Registration failed. Please try again.",
        Endpoint::Login => "Login failed. Check your username and password.",
        Endpoint::CurrentMember => "Failed to load your profile.",
        Endpoint::ListMessages => "Failed to load messages.",
        Endpoint::CreateMessage => "Failed to send the message.",
    }
}
