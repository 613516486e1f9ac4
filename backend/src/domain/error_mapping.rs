//! Translation of driven-port errors into domain errors.
//!
//! Connection failures become `service_unavailable`, natural-key clashes
//! become `conflict`, and everything else is an internal error.

use serde_json::json;

use super::Error;
use super::ports::{
    ExperimentDataRepositoryError, ExperimentKeyValueRepositoryError, UserPersistenceError,
};

fn duplicate_key_conflict(message: &str) -> Error {
    Error::conflict(message).with_details(json!({ "code": "duplicate_key" }))
}

pub(crate) fn map_data_error(error: ExperimentDataRepositoryError) -> Error {
    match error {
        ExperimentDataRepositoryError::Connection { message } => Error::service_unavailable(
            format!("experiment data repository unavailable: {message}"),
        ),
        ExperimentDataRepositoryError::Query { message } => {
            Error::internal(format!("experiment data repository error: {message}"))
        }
        ExperimentDataRepositoryError::DuplicateKey { .. } => duplicate_key_conflict(
            "experiment data already exists for this user, experiment, and key",
        ),
    }
}

pub(crate) fn map_key_value_error(error: ExperimentKeyValueRepositoryError) -> Error {
    match error {
        ExperimentKeyValueRepositoryError::Connection { message } => Error::service_unavailable(
            format!("experiment key-value repository unavailable: {message}"),
        ),
        ExperimentKeyValueRepositoryError::Query { message } => {
            Error::internal(format!("experiment key-value repository error: {message}"))
        }
        ExperimentKeyValueRepositoryError::DuplicateKey { .. } => {
            duplicate_key_conflict("experiment key-value already exists for this experiment and key")
        }
    }
}

pub(crate) fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        UserPersistenceError::Query { message } => {
            Error::internal(format!("user repository error: {message}"))
        }
    }
}
