//! Principal resolution for session and bearer credentials.
//!
//! Session credentials accept inactive accounts so a user who is mid-way
//! through activation can still record experiment data. Bearer tokens require
//! an active account.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::error_mapping::map_user_error;
use crate::domain::ports::{
    AccessTokenError, AccessTokenVerifier, PrincipalResolver, UserRepository,
};
use crate::domain::{BearerToken, Error, User, UserId};

/// Resolves authenticated principals from user storage.
pub struct PrincipalService<U: ?Sized, V: ?Sized> {
    users: Arc<U>,
    verifier: Arc<V>,
}

impl<U: ?Sized, V: ?Sized> Clone for PrincipalService<U, V> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

impl<U: ?Sized, V: ?Sized> PrincipalService<U, V> {
    /// Create a resolver over `users`, validating bearer tokens with `verifier`.
    pub fn new(users: Arc<U>, verifier: Arc<V>) -> Self {
        Self { users, verifier }
    }
}

impl<U, V> PrincipalService<U, V>
where
    U: UserRepository + ?Sized,
    V: AccessTokenVerifier + ?Sized,
{
    async fn load(&self, id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(id)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::unauthorized("account no longer exists"))
    }
}

fn map_token_error(error: AccessTokenError) -> Error {
    debug!(%error, "bearer token rejected");
    match error {
        AccessTokenError::Expired => Error::unauthorized("access token expired"),
        AccessTokenError::Disabled => Error::unauthorized("bearer authentication is not enabled"),
        AccessTokenError::Invalid { .. } => Error::unauthorized("invalid access token"),
    }
}

#[async_trait]
impl<U, V> PrincipalResolver for PrincipalService<U, V>
where
    U: UserRepository + ?Sized,
    V: AccessTokenVerifier + ?Sized,
{
    async fn from_session(&self, user_id: &UserId) -> Result<User, Error> {
        self.load(user_id).await
    }

    async fn from_bearer(&self, token: &BearerToken) -> Result<User, Error> {
        let subject = self.verifier.verify(token).map_err(map_token_error)?;
        let user = self.load(&subject).await?;
        if !user.is_active() {
            return Err(Error::unauthorized("account is inactive"));
        }
        Ok(user)
    }
}
