//! Domain ports: the traits inbound and outbound adapters meet at.
//!
//! Driven ports (`*Repository`, [`AccessTokenVerifier`]) are implemented by
//! outbound adapters. Driving ports (`*Command`, `*Query`, [`LoginService`],
//! [`PrincipalResolver`]) are implemented by domain services and called by the
//! HTTP adapter.

mod macros;
pub(crate) use macros::define_port_error;

mod access_token_verifier;
mod experiment_data_command;
mod experiment_data_query;
mod experiment_data_repository;
mod experiment_key_value_command;
mod experiment_key_value_query;
mod experiment_key_value_repository;
mod login_service;
mod principal_resolver;
mod user_repository;

#[cfg(test)]
pub use access_token_verifier::MockAccessTokenVerifier;
pub use access_token_verifier::{
    AccessTokenError, AccessTokenVerifier, DisabledAccessTokenVerifier,
};
#[cfg(test)]
pub use experiment_data_command::MockExperimentDataCommand;
pub use experiment_data_command::{
    BulkUpsertItem, CreateExperimentDataRequest, ExperimentDataCommand,
    UpsertExperimentDataRequest,
};
#[cfg(test)]
pub use experiment_data_query::MockExperimentDataQuery;
pub use experiment_data_query::ExperimentDataQuery;
#[cfg(test)]
pub use experiment_data_repository::MockExperimentDataRepository;
pub use experiment_data_repository::{ExperimentDataRepository, ExperimentDataRepositoryError};
#[cfg(test)]
pub use experiment_key_value_command::MockExperimentKeyValueCommand;
pub use experiment_key_value_command::ExperimentKeyValueCommand;
#[cfg(test)]
pub use experiment_key_value_query::MockExperimentKeyValueQuery;
pub use experiment_key_value_query::ExperimentKeyValueQuery;
#[cfg(test)]
pub use experiment_key_value_repository::MockExperimentKeyValueRepository;
pub use experiment_key_value_repository::{
    ExperimentKeyValueRepository, ExperimentKeyValueRepositoryError,
};
#[cfg(test)]
pub use login_service::MockLoginService;
pub use login_service::{FIXTURE_ADMIN_ID, FixtureLoginService, LoginService};
#[cfg(test)]
pub use principal_resolver::MockPrincipalResolver;
pub use principal_resolver::PrincipalResolver;
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserPersistenceError, UserRepository};
