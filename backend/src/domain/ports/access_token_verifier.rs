//! Driven port for validating bearer access tokens.

use crate::domain::{BearerToken, UserId};

use super::define_port_error;

define_port_error! {
    /// Reasons a bearer token is rejected.
    pub enum AccessTokenError {
        /// Signature, issuer, audience, or subject did not validate.
        Invalid { message: String } => "access token rejected: {message}",
        /// The token is past its expiry.
        Expired => "access token expired",
        /// No signing secret is configured, so bearer auth is off.
        Disabled => "bearer authentication is not configured",
    }
}

/// Verify a bearer token and return the subject it was issued to.
#[cfg_attr(test, mockall::automock)]
pub trait AccessTokenVerifier: Send + Sync {
    /// Validate `token` and return its subject.
    fn verify(&self, token: &BearerToken) -> Result<UserId, AccessTokenError>;
}

/// Verifier used when no signing secret is configured. Rejects every token.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAccessTokenVerifier;

impl AccessTokenVerifier for DisabledAccessTokenVerifier {
    fn verify(&self, _token: &BearerToken) -> Result<UserId, AccessTokenError> {
        Err(AccessTokenError::disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_verifier_rejects_tokens() {
        let token = BearerToken::from_header_value("Bearer abc").expect("bearer header");
        assert_eq!(
            DisabledAccessTokenVerifier.verify(&token),
            Err(AccessTokenError::Disabled)
        );
    }
}
