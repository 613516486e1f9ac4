//! Server settings loaded via OrthoConfig.
//!
//! Values come from `EXPERIMENTS_*` environment variables, configuration
//! files, and command-line flags. Session toggles are validated against the
//! build mode: debug builds fall back to defaults with a warning, release
//! builds refuse to start on missing or invalid values.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use actix_web::cookie::{Key, SameSite};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use tracing::warn;
use zeroize::Zeroize;

use crate::outbound::persistence::PoolConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_POOL_TIMEOUT_SECS: u64 = 5;
const SESSION_KEY_DEFAULT_PATH: &str = "/var/run/secrets/session_key";
const SESSION_KEY_MIN_LEN: usize = 64;
const DEFAULT_JWT_ISSUER: &str = "experiments";
const DEFAULT_JWT_AUDIENCE: &str = "experiments-api";
const COOKIE_SECURE_NAME: &str = "EXPERIMENTS_SESSION_COOKIE_SECURE";
const SAMESITE_NAME: &str = "EXPERIMENTS_SESSION_SAMESITE";
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";
const SAMESITE_EXPECTED: &str = "Strict|Lax|None";

/// Build mode for session configuration validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate defaults and emit warnings for missing toggles.
    Debug,
    /// Release builds require explicit, valid session toggles.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Errors raised while validating settings.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// A required value is missing.
    #[error("missing required setting: {name}")]
    Missing { name: &'static str },
    /// A value is present but invalid.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Reading the session key file failed.
    #[error("failed to read session key at {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The session key file is too short for release builds.
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
    /// `SameSite=None` requires secure cookies in release builds.
    #[error("SameSite=None requires secure session cookies")]
    InsecureSameSiteNone,
    /// Release builds must not use ephemeral session keys.
    #[error("ephemeral session keys are not allowed in release builds")]
    EphemeralNotAllowed,
}

/// Configuration for the experiments server.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "EXPERIMENTS")]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection string. Without it data lives in memory.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub pool_max_size: Option<u32>,
    /// Seconds to wait for a pooled connection.
    pub pool_timeout_secs: Option<u64>,
    /// Apply pending migrations before serving.
    #[ortho_config(default = false)]
    pub run_migrations: bool,
    /// File holding the session signing key.
    pub session_key_file: Option<PathBuf>,
    /// Permit a generated session key when the key file is unreadable.
    #[ortho_config(default = false)]
    pub session_allow_ephemeral: bool,
    /// Whether session cookies are marked `Secure` (`1|0|true|false`).
    pub session_cookie_secure: Option<String>,
    /// Session cookie `SameSite` policy (`Strict|Lax|None`).
    pub session_samesite: Option<String>,
    /// HS256 secret for bearer tokens. Bearer auth is off without it.
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim.
    pub jwt_issuer: Option<String>,
    /// Expected `aud` claim.
    pub jwt_audience: Option<String>,
}

/// Session settings derived from [`ServerSettings`].
pub struct SessionSettings {
    /// Signing key for cookie sessions.
    pub key: Key,
    /// Whether session cookies are marked `Secure`.
    pub cookie_secure: bool,
    /// Configured `SameSite` policy for session cookies.
    pub same_site: SameSite,
}

/// Bearer token verification settings.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessTokenSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

impl std::fmt::Debug for AccessTokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ServerSettings {
    /// Parse the listen address, defaulting to `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|_| SettingsError::Invalid {
            name: "EXPERIMENTS_BIND_ADDR",
            value: raw.to_owned(),
            expected: "host:port",
        })
    }

    /// Pool configuration when a database URL is set.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        self.database_url.as_deref().map(|url| {
            PoolConfig::new(url)
                .with_max_size(self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE))
                .with_connection_timeout(Duration::from_secs(
                    self.pool_timeout_secs.unwrap_or(DEFAULT_POOL_TIMEOUT_SECS),
                ))
        })
    }

    /// Token settings when a signing secret is configured.
    pub fn access_tokens(&self) -> Option<AccessTokenSettings> {
        let secret = self.jwt_secret.as_deref().filter(|s| !s.trim().is_empty())?;
        Some(AccessTokenSettings {
            secret: secret.to_owned(),
            issuer: self
                .jwt_issuer
                .clone()
                .unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_owned()),
            audience: self
                .jwt_audience
                .clone()
                .unwrap_or_else(|| DEFAULT_JWT_AUDIENCE.to_owned()),
        })
    }

    /// Validate the session toggles and load the signing key.
    pub fn session(&self, mode: BuildMode) -> Result<SessionSettings, SettingsError> {
        let cookie_secure = self.cookie_secure(mode)?;
        let same_site = self.same_site(mode, cookie_secure)?;
        if self.session_allow_ephemeral && !mode.is_debug() {
            return Err(SettingsError::EphemeralNotAllowed);
        }
        let key = self.session_key(mode)?;
        Ok(SessionSettings {
            key,
            cookie_secure,
            same_site,
        })
    }

    fn cookie_secure(&self, mode: BuildMode) -> Result<bool, SettingsError> {
        let Some(value) = self.session_cookie_secure.as_deref() else {
            if mode.is_debug() {
                warn!("session cookie security not set; defaulting to secure");
                return Ok(true);
            }
            return Err(SettingsError::Missing {
                name: COOKIE_SECURE_NAME,
            });
        };
        match parse_bool(value) {
            Some(flag) => Ok(flag),
            None if mode.is_debug() => {
                warn!(value, "invalid session cookie security; defaulting to secure");
                Ok(true)
            }
            None => Err(SettingsError::Invalid {
                name: COOKIE_SECURE_NAME,
                value: value.to_owned(),
                expected: BOOL_EXPECTED,
            }),
        }
    }

    fn same_site(&self, mode: BuildMode, cookie_secure: bool) -> Result<SameSite, SettingsError> {
        let default_same_site = if mode.is_debug() {
            SameSite::Lax
        } else {
            SameSite::Strict
        };
        let Some(value) = self.session_samesite.as_deref() else {
            if mode.is_debug() {
                warn!("session SameSite not set; using default");
                return Ok(default_same_site);
            }
            return Err(SettingsError::Missing {
                name: SAMESITE_NAME,
            });
        };
        match value.to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" if cookie_secure => Ok(SameSite::None),
            "none" if mode.is_debug() => {
                warn!("SameSite=None without secure cookies; browsers may reject them");
                Ok(SameSite::None)
            }
            "none" => Err(SettingsError::InsecureSameSiteNone),
            _ if mode.is_debug() => {
                warn!(value, "invalid session SameSite; using default");
                Ok(default_same_site)
            }
            _ => Err(SettingsError::Invalid {
                name: SAMESITE_NAME,
                value: value.to_owned(),
                expected: SAMESITE_EXPECTED,
            }),
        }
    }

    fn session_key(&self, mode: BuildMode) -> Result<Key, SettingsError> {
        let path = self
            .session_key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(SESSION_KEY_DEFAULT_PATH));
        match std::fs::read(&path) {
            Ok(mut bytes) => {
                let length = bytes.len();
                if mode == BuildMode::Release && length < SESSION_KEY_MIN_LEN {
                    bytes.zeroize();
                    return Err(SettingsError::KeyTooShort {
                        path,
                        length,
                        min_len: SESSION_KEY_MIN_LEN,
                    });
                }
                let key = Key::derive_from(&bytes);
                bytes.zeroize();
                Ok(key)
            }
            Err(error) if mode.is_debug() || self.session_allow_ephemeral => {
                warn!(
                    path = %path.display(),
                    %error,
                    "using temporary session key (dev only)"
                );
                Ok(Key::generate())
            }
            Err(source) => Err(SettingsError::KeyRead { path, source }),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for server settings parsing and session validation.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::{fixture, rstest};

    const VARS: [&str; 12] = [
        "EXPERIMENTS_BIND_ADDR",
        "EXPERIMENTS_DATABASE_URL",
        "EXPERIMENTS_POOL_MAX_SIZE",
        "EXPERIMENTS_POOL_TIMEOUT_SECS",
        "EXPERIMENTS_RUN_MIGRATIONS",
        "EXPERIMENTS_SESSION_KEY_FILE",
        "EXPERIMENTS_SESSION_ALLOW_EPHEMERAL",
        "EXPERIMENTS_SESSION_COOKIE_SECURE",
        "EXPERIMENTS_SESSION_SAMESITE",
        "EXPERIMENTS_JWT_SECRET",
        "EXPERIMENTS_JWT_ISSUER",
        "EXPERIMENTS_JWT_AUDIENCE",
    ];

    fn load_with(overrides: &[(&str, &str)]) -> ServerSettings {
        let vars = VARS.map(|name| {
            let value = overrides
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned());
            (name, value)
        });
        let _guard = lock_env(vars);
        ServerSettings::load_from_iter([OsString::from("experiments")])
            .expect("settings should load")
    }

    #[fixture]
    fn bare() -> ServerSettings {
        ServerSettings {
            bind_addr: None,
            database_url: None,
            pool_max_size: None,
            pool_timeout_secs: None,
            run_migrations: false,
            session_key_file: Some(PathBuf::from("/nonexistent/session_key")),
            session_allow_ephemeral: false,
            session_cookie_secure: None,
            session_samesite: None,
            jwt_secret: None,
            jwt_issuer: None,
            jwt_audience: None,
        }
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let settings = load_with(&[]);
        assert_eq!(
            settings.bind_addr().expect("default address"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("literal")
        );
        assert!(settings.pool_config().is_none());
        assert!(settings.access_tokens().is_none());
        assert!(!settings.run_migrations);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let settings = load_with(&[
            ("EXPERIMENTS_BIND_ADDR", "127.0.0.1:9000"),
            ("EXPERIMENTS_DATABASE_URL", "postgres://localhost/experiments"),
            ("EXPERIMENTS_POOL_MAX_SIZE", "4"),
            ("EXPERIMENTS_RUN_MIGRATIONS", "true"),
            ("EXPERIMENTS_JWT_SECRET", "s3cret"),
            ("EXPERIMENTS_JWT_ISSUER", "lms"),
        ]);
        assert_eq!(settings.bind_addr().expect("address").port(), 9000);
        let pool = settings.pool_config().expect("pool configured");
        assert_eq!(pool.database_url(), "postgres://localhost/experiments");
        assert_eq!(pool.max_size(), 4);
        assert!(settings.run_migrations);
        let tokens = settings.access_tokens().expect("tokens configured");
        assert_eq!(tokens.issuer, "lms");
        assert_eq!(tokens.audience, DEFAULT_JWT_AUDIENCE);
    }

    #[rstest]
    fn invalid_bind_addr_is_reported(mut bare: ServerSettings) {
        bare.bind_addr = Some("not-an-address".into());
        assert!(matches!(
            bare.bind_addr(),
            Err(SettingsError::Invalid { name: "EXPERIMENTS_BIND_ADDR", .. })
        ));
    }

    #[rstest]
    fn blank_jwt_secret_disables_tokens(mut bare: ServerSettings) {
        bare.jwt_secret = Some("  ".into());
        assert!(bare.access_tokens().is_none());
    }

    #[rstest]
    fn debug_mode_tolerates_missing_toggles(bare: ServerSettings) {
        let session = bare.session(BuildMode::Debug).expect("debug defaults");
        assert!(session.cookie_secure);
        assert_eq!(session.same_site, SameSite::Lax);
    }

    #[rstest]
    fn release_mode_requires_cookie_toggle(bare: ServerSettings) {
        assert!(matches!(
            bare.session(BuildMode::Release),
            Err(SettingsError::Missing { name: COOKIE_SECURE_NAME })
        ));
    }

    #[rstest]
    #[case("maybe", BuildMode::Release, true)]
    #[case("maybe", BuildMode::Debug, false)]
    fn invalid_cookie_toggle(
        mut bare: ServerSettings,
        #[case] value: &str,
        #[case] mode: BuildMode,
        #[case] rejected: bool,
    ) {
        bare.session_cookie_secure = Some(value.into());
        assert_eq!(bare.cookie_secure(mode).is_err(), rejected);
    }

    #[rstest]
    fn release_rejects_insecure_samesite_none(mut bare: ServerSettings) {
        bare.session_samesite = Some("None".into());
        assert!(matches!(
            bare.same_site(BuildMode::Release, false),
            Err(SettingsError::InsecureSameSiteNone)
        ));
        assert_eq!(
            bare.same_site(BuildMode::Release, true)
                .expect("secure none"),
            SameSite::None
        );
    }

    #[rstest]
    fn release_rejects_ephemeral_keys(mut bare: ServerSettings) {
        bare.session_cookie_secure = Some("1".into());
        bare.session_samesite = Some("Strict".into());
        bare.session_allow_ephemeral = true;
        assert!(matches!(
            bare.session(BuildMode::Release),
            Err(SettingsError::EphemeralNotAllowed)
        ));
    }

    #[rstest]
    fn release_requires_readable_key(mut bare: ServerSettings) {
        bare.session_cookie_secure = Some("1".into());
        bare.session_samesite = Some("Strict".into());
        assert!(matches!(
            bare.session(BuildMode::Release),
            Err(SettingsError::KeyRead { .. })
        ));
    }

    #[rstest]
    fn release_rejects_short_keys(mut bare: ServerSettings) {
        let path = std::env::temp_dir().join(format!("experiments-key-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"too-short").expect("write key");
        bare.session_key_file = Some(path.clone());
        bare.session_cookie_secure = Some("1".into());
        bare.session_samesite = Some("Strict".into());

        let result = bare.session(BuildMode::Release);
        std::fs::remove_file(&path).expect("remove key");
        assert!(matches!(result, Err(SettingsError::KeyTooShort { length: 9, .. })));
    }

    #[rstest]
    fn release_accepts_long_keys(mut bare: ServerSettings) {
        let path = std::env::temp_dir().join(format!("experiments-key-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, vec![b'k'; SESSION_KEY_MIN_LEN]).expect("write key");
        bare.session_key_file = Some(path.clone());
        bare.session_cookie_secure = Some("true".into());
        bare.session_samesite = Some("strict".into());

        let result = bare.session(BuildMode::Release);
        std::fs::remove_file(&path).expect("remove key");
        let session = result.expect("valid release settings");
        assert!(session.cookie_secure);
        assert_eq!(session.same_site, SameSite::Strict);
    }
}
