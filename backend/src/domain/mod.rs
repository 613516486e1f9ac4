//! Domain primitives, aggregates, and services.
//!
//! Purpose: define the strongly typed experiment entities used by the HTTP
//! and persistence layers, and the services that drive them through the
//! ports in [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: API error payload and stable error identifier.
//! - User / UserId / Username: authenticated principal and its identifiers.
//! - ExperimentData / ExperimentKeyValue: the two stored entities.
//! - UpsertResolver / WriteOutcome: create-or-update resolution.
//! - ExperimentDataService / ExperimentKeyValueService / PrincipalService:
//!   implementations of the driving ports.

pub mod auth;
pub mod error;
pub(crate) mod error_mapping;
pub mod experiment;
pub mod experiment_data_service;
pub mod experiment_key_value_service;
pub mod ports;
pub mod principal_service;
pub mod trace_id;
pub mod upsert_resolver;
pub mod user;
pub mod user_cache;

pub use self::auth::{BearerToken, LoginCredentials, LoginValidationError};
pub use self::error::{Error, ErrorCode, ErrorValidationError, TRACE_ID_HEADER};
pub use self::experiment::{
    EXPERIMENT_ID_MAX, EXPERIMENT_KEY_MAX, ExperimentData, ExperimentDataId, ExperimentFields,
    ExperimentFilter, ExperimentId, ExperimentKey, ExperimentKeyValue, ExperimentKeyValueId,
    ExperimentValidationError, ExperimentValue, NewExperimentData, NewExperimentKeyValue,
    missing_field,
};
pub use self::experiment_data_service::ExperimentDataService;
pub use self::experiment_key_value_service::ExperimentKeyValueService;
pub use self::principal_service::PrincipalService;
pub use self::trace_id::TraceId;
pub use self::upsert_resolver::{UpsertResolver, WriteOutcome};
pub use self::user::{USERNAME_MAX, User, UserId, UserValidationError, Username};
pub use self::user_cache::UserCache;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use experiments::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
