//! HS256 JWT implementation of [`AccessTokenVerifier`].
//!
//! Tokens must carry the configured issuer and audience and an unexpired
//! `exp`. The `sub` claim is the user's UUID.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::domain::ports::{AccessTokenError, AccessTokenVerifier};
use crate::domain::{BearerToken, UserId};

/// Registered claims read from and written to access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Verifies HS256 access tokens against a shared secret.
#[derive(Clone)]
pub struct JwtAccessTokenVerifier {
    secret: Zeroizing<String>,
    issuer: String,
    audience: String,
}

impl fmt::Debug for JwtAccessTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAccessTokenVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl JwtAccessTokenVerifier {
    /// Create a verifier for tokens signed with `secret`.
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Sign a token for `subject` that expires after `ttl`.
    ///
    /// Used by operators and tests to mint tokens the verifier accepts.
    pub fn issue_token(&self, subject: &UserId, ttl: Duration) -> Result<String, AccessTokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|err| AccessTokenError::invalid(err.to_string()))
    }

    fn decode_claims(&self, token: &str) -> Result<AccessClaims, AccessTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;

        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AccessTokenError::expired(),
            _ => AccessTokenError::invalid(err.to_string()),
        })
    }
}

impl AccessTokenVerifier for JwtAccessTokenVerifier {
    fn verify(&self, token: &BearerToken) -> Result<UserId, AccessTokenError> {
        let claims = self.decode_claims(token.as_str())?;
        UserId::new(&claims.sub)
            .map_err(|err| AccessTokenError::invalid(format!("subject is not a user id: {err}")))
    }
}
