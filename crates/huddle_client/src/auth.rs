//! Login, registration and logout.

use crate::api::ChatApi;
use crate::credential::{Credential, CredentialStore};
use crate::error::{ClientError, ClientResult};
use crate::guard::SessionGuard;
use crate::navigation::{Navigator, Route};
use crate::transport::HttpTransport;
use huddle_protocol::{
    AuthResponse, CredentialsRequest, Member, ProtocolError, MAX_USERNAME_LEN, MIN_PASSWORD_LEN,
};
use std::sync::Arc;
use tracing::info;

/// Drives the authentication surfaces.
///
/// The only writer of the credential besides the session guard.
pub struct AuthFlow<T: HttpTransport> {
    api: Arc<ChatApi<T>>,
    guard: Arc<SessionGuard>,
    credentials: Arc<dyn CredentialStore>,
    navigator: Navigator,
}

impl<T: HttpTransport> AuthFlow<T> {
    /// Creates a new auth flow.
    pub fn new(
        api: Arc<ChatApi<T>>,
        guard: Arc<SessionGuard>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Navigator,
    ) -> Self {
        Self {
            api,
            guard,
            credentials,
            navigator,
        }
    }

    /// Logs in and moves to the feed.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Member> {
        let request = validate_login(username, password)?;
        let response = self.api.login(&request).await?;
        self.establish(response)
    }

    /// Registers a new member, logs in as them and moves to the feed.
    pub async fn register(&self, username: &str, password: &str) -> ClientResult<Member> {
        let request = validate_registration(username, password)?;
        let response = self.api.register(&request).await?;
        self.establish(response)
    }

    /// Clears the credential and moves to login.
    pub fn logout(&self) -> ClientResult<()> {
        self.credentials.clear()?;
        info!("Logged out");
        self.navigator.navigate(Route::Login);
        Ok(())
    }

    /// Fetches the signed-in member. A rejected credential signs the user out.
    pub async fn current_member(&self) -> ClientResult<Member> {
        if !self.guard.require_authentication() {
            return Err(ClientError::NotAuthenticated);
        }
        let result = self.api.current_member().await;
        self.guard.inspect(result).into_result()
    }

    /// Returns true if a credential is stored.
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_authenticated()
    }

    fn establish(&self, response: AuthResponse) -> ClientResult<Member> {
        let credential = Credential::new(response.token)
            .map_err(|_| ProtocolError::Decode("empty token in auth response".into()))?;
        self.credentials.set(credential)?;
        info!(username = %response.member.username, "Signed in");
        self.navigator.navigate(Route::Feed);
        Ok(response.member)
    }
}

fn validate_login(username: &str, password: &str) -> ClientResult<CredentialsRequest> {
    let username = username.trim();
    if username.is_empty() || password.trim().is_empty() {
        return Err(ClientError::Validation(
            "Please enter both username and password.".into(),
        ));
    }
    Ok(CredentialsRequest::new(username, password))
}

fn validate_registration(username: &str, password: &str) -> ClientResult<CredentialsRequest> {
    let request = validate_login(username, password)?;
    if request.username.chars().count() > MAX_USERNAME_LEN {
        return Err(ClientError::Validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters."
        )));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AuthenticatedClient;
    use crate::config::ClientConfig;
    use crate::credential::MemoryCredentialStore;
    use crate::transport::{HttpResponse, MockTransport};
    use chrono::{TimeZone, Utc};
    use huddle_protocol::Method;

    const LOGIN: &str = "/api/members/login/";
    const REGISTER: &str = "/api/members/register/";
    const ME: &str = "/api/members/me/";

    struct Fixture {
        auth: AuthFlow<Arc<MockTransport>>,
        transport: Arc<MockTransport>,
        store: Arc<MemoryCredentialStore>,
        navigator: Navigator,
    }

    fn fixture(store: MemoryCredentialStore) -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(store);
        let navigator = Navigator::new(Route::Login);
        let client = AuthenticatedClient::new(Arc::clone(&transport), store.clone());
        let api = Arc::new(ChatApi::new(client, &ClientConfig::default()));
        let guard = Arc::new(SessionGuard::new(store.clone(), navigator.clone()));
        Fixture {
            auth: AuthFlow::new(api, guard, store.clone(), navigator.clone()),
            transport,
            store,
            navigator,
        }
    }

    fn member(username: &str) -> Member {
        Member {
            id: 1,
            username: username.into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn auth_response(token: &str) -> HttpResponse {
        HttpResponse::json(
            200,
            &AuthResponse {
                token: token.into(),
                member: member("alice"),
            },
        )
    }

    #[tokio::test]
    async fn login_stores_token_and_navigates() {
        let f = fixture(MemoryCredentialStore::new());
        f.transport.set_response(Method::Post, LOGIN, auth_response("abc"));

        let member = f.auth.login("alice", "secret").await.unwrap();

        assert_eq!(member.username, "alice");
        assert_eq!(f.store.get().unwrap().as_str(), "abc");
        assert_eq!(f.navigator.current(), Route::Feed);
    }

    #[tokio::test]
    async fn login_is_sent_without_stale_credential() {
        let f = fixture(MemoryCredentialStore::with_credential(
            Credential::new("old").unwrap(),
        ));
        f.transport.set_response(Method::Post, LOGIN, auth_response("new"));

        f.auth.login("alice", "secret").await.unwrap();

        assert_eq!(f.transport.requests()[0].header("Authorization"), None);
        assert_eq!(f.store.get().unwrap().as_str(), "new");
    }

    #[tokio::test]
    async fn failed_login_keeps_existing_credential() {
        let f = fixture(MemoryCredentialStore::with_credential(
            Credential::new("valid").unwrap(),
        ));
        f.navigator.navigate(Route::Feed);
        f.transport.set_response(
            Method::Post,
            LOGIN,
            HttpResponse::new(400, r#"{"detail": "Invalid username or password."}"#),
        );

        f.auth.login("alice", "wrong").await.unwrap_err();
        assert_eq!(f.store.get().unwrap().as_str(), "valid");

        f.transport.set_failure(Method::Post, LOGIN, "connection refused");
        let err = f.auth.login("alice", "secret").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(f.store.get().unwrap().as_str(), "valid");

        f.transport.set_failure(Method::Post, REGISTER, "connection refused");
        f.auth.register("bob", "secret").await.unwrap_err();
        assert_eq!(f.store.get().unwrap().as_str(), "valid");
        assert_eq!(f.navigator.current(), Route::Feed);
    }

    #[tokio::test]
    async fn empty_fields_make_no_request() {
        let f = fixture(MemoryCredentialStore::new());

        let err = f.auth.login("  ", "secret").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        let err = f.auth.register("alice", "").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        assert!(f.transport.requests().is_empty());
        assert_eq!(f.navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn short_password_is_rejected_locally() {
        let f = fixture(MemoryCredentialStore::new());

        let err = f.auth.register("alice", "abc").await.unwrap_err();

        assert_eq!(err.user_message(), "Password must be at least 4 characters.");
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_login_keeps_user_on_login() {
        let f = fixture(MemoryCredentialStore::new());
        f.transport.set_response(
            Method::Post,
            LOGIN,
            HttpResponse::new(400, r#"{"detail": "Invalid username or password."}"#),
        );

        let err = f.auth.login("alice", "wrong").await.unwrap_err();

        assert_eq!(err.user_message(), "Invalid username or password.");
        assert!(!f.store.is_authenticated());
        assert_eq!(f.navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn register_surfaces_duplicate_username() {
        let f = fixture(MemoryCredentialStore::new());
        f.transport.set_response(
            Method::Post,
            REGISTER,
            HttpResponse::new(
                400,
                r#"{"username": ["A member with that username already exists."]}"#,
            ),
        );

        let err = f.auth.register("alice", "secret").await.unwrap_err();

        assert_eq!(
            err.user_message(),
            "A member with that username already exists."
        );
        assert!(!f.store.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_and_navigates() {
        let f = fixture(MemoryCredentialStore::with_credential(
            Credential::new("abc").unwrap(),
        ));
        f.navigator.navigate(Route::Feed);

        f.auth.logout().unwrap();

        assert!(!f.auth.is_authenticated());
        assert_eq!(f.navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn current_member_with_rejected_token_signs_out() {
        let f = fixture(MemoryCredentialStore::with_credential(
            Credential::new("abc").unwrap(),
        ));
        f.navigator.navigate(Route::Feed);
        f.transport
            .set_response(Method::Get, ME, HttpResponse::new(401, "{}"));

        let err = f.auth.current_member().await.unwrap_err();

        assert!(matches!(err, ClientError::NotAuthenticated));
        assert!(!f.store.is_authenticated());
        assert_eq!(f.navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn current_member_without_credential_makes_no_request() {
        let f = fixture(MemoryCredentialStore::new());

        let err = f.auth.current_member().await.unwrap_err();

        assert!(matches!(err, ClientError::NotAuthenticated));
        assert!(f.transport.requests().is_empty());
    }

    #[test]
    fn long_username_is_rejected() {
        let name = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(validate_registration(&name, "secret").is_err());
        assert!(validate_login(&name, "secret").is_ok());
    }
}
