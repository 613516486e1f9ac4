//! Driving port turning authentication material into a [`User`].

use async_trait::async_trait;

use crate::domain::{BearerToken, Error, User, UserId};

/// Resolve the principal behind a request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolve a session-held user id. Inactive accounts are accepted.
    async fn from_session(&self, user_id: &UserId) -> Result<User, Error>;

    /// Resolve a bearer token. Inactive accounts are rejected.
    async fn from_bearer(&self, token: &BearerToken) -> Result<User, Error>;
}
