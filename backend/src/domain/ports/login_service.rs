//! Driving port for interactive login.
//!
//! Credentials storage lives outside this service, so the bundled
//! implementation accepts one development account and makes sure it exists in
//! the user repository as a staff user.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::error_mapping::map_user_error;
use crate::domain::{Error, LoginCredentials, User, UserId, Username};

use super::UserRepository;

/// Identifier of the development account.
pub const FIXTURE_ADMIN_ID: &str = "123e4567-e89b-12d3-a456-426614174000";
const FIXTURE_ADMIN_USERNAME: &str = "admin";
const FIXTURE_ADMIN_PASSWORD: &str = "password";

/// Authenticate credentials and return the matching user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoginService: Send + Sync {
    /// Validate credentials and return the authenticated user.
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<User, Error>;
}

/// Development authenticator: `admin` / `password` logs in as a staff user.
#[derive(Clone)]
pub struct FixtureLoginService {
    users: Arc<dyn UserRepository>,
}

impl FixtureLoginService {
    /// Build the authenticator over the given user store.
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    fn fixture_admin() -> Result<User, Error> {
        let id = UserId::new(FIXTURE_ADMIN_ID)
            .map_err(|err| Error::internal(format!("invalid fixture user id: {err}")))?;
        let username = Username::new(FIXTURE_ADMIN_USERNAME)
            .map_err(|err| Error::internal(format!("invalid fixture username: {err}")))?;
        Ok(User::new(id, username).with_staff(true))
    }
}

#[async_trait]
impl LoginService for FixtureLoginService {
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<User, Error> {
        if credentials.username() != FIXTURE_ADMIN_USERNAME
            || credentials.password() != FIXTURE_ADMIN_PASSWORD
        {
            return Err(Error::unauthorized("invalid credentials"));
        }
        let admin = Self::fixture_admin()?;
        self.users.upsert(&admin).await.map_err(map_user_error)?;
        Ok(admin)
    }
}
