//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use chrono::Duration;

use crate::domain::ports::UserRepository;
use crate::domain::{User, UserId, Username};
use crate::outbound::memory::InMemoryExperimentStore;
use crate::outbound::token::JwtAccessTokenVerifier;

use super::state::{HttpState, HttpStateAdapters};

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Extract the `session` cookie set by a response.
pub fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

/// Build an active user with the given name and staff flag.
pub fn user(username: &str, is_staff: bool) -> User {
    User::new(UserId::random(), Username::new(username).expect("valid username"))
        .with_staff(is_staff)
}

/// HTTP state wired over a fresh in-memory store, with bearer tokens enabled.
pub struct TestBackend {
    pub state: HttpState,
    pub store: Arc<InMemoryExperimentStore>,
    tokens: JwtAccessTokenVerifier,
}

impl TestBackend {
    /// Build the backend and store every user in `users`.
    pub async fn with_users(users: &[&User]) -> Self {
        let store = Arc::new(InMemoryExperimentStore::new());
        for account in users {
            UserRepository::upsert(store.as_ref(), account)
                .await
                .expect("seed user");
        }
        let tokens = JwtAccessTokenVerifier::new("http-tests", "experiments", "experiments-api");
        let state = HttpState::from_adapters(HttpStateAdapters {
            users: store.clone(),
            experiment_data: store.clone(),
            key_values: store.clone(),
            access_tokens: Arc::new(tokens.clone()),
        });
        Self {
            state,
            store,
            tokens,
        }
    }

    /// `Authorization` header authenticating as `account`.
    pub fn bearer(&self, account: &User) -> (header::HeaderName, String) {
        let token = self
            .tokens
            .issue_token(account.id(), Duration::minutes(5))
            .expect("token issued");
        (header::AUTHORIZATION, format!("Bearer {token}"))
    }
}
