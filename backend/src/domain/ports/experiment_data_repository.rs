//! Driven port for user-scoped experiment data storage.
//!
//! Every read and mutation except `insert` is scoped to an owner so adapters
//! never return another user's rows.

use async_trait::async_trait;

use crate::domain::{
    ExperimentData, ExperimentDataId, ExperimentFields, ExperimentFilter, ExperimentId,
    ExperimentKey, NewExperimentData, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by experiment data repository adapters.
    pub enum ExperimentDataRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "experiment data repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "experiment data repository query failed: {message}",
        /// The write would create a second row for `(owner, experiment_id, key)`.
        DuplicateKey { message: String } =>
            "experiment data already exists: {message}",
    }
}

/// Storage for [`ExperimentData`] rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentDataRepository: Send + Sync {
    /// Fetch a row by identity, returning `None` when absent or owned by
    /// someone else.
    async fn find_by_id(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
    ) -> Result<Option<ExperimentData>, ExperimentDataRepositoryError>;

    /// Fetch the row matching `(owner, experiment_id, key)`.
    async fn find_by_natural_key(
        &self,
        owner: &UserId,
        experiment_id: ExperimentId,
        key: &ExperimentKey,
    ) -> Result<Option<ExperimentData>, ExperimentDataRepositoryError>;

    /// List the owner's rows that pass `filter`, ordered by identity.
    async fn list(
        &self,
        owner: &UserId,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentData>, ExperimentDataRepositoryError>;

    /// Insert a row.
    ///
    /// Fails with [`ExperimentDataRepositoryError::DuplicateKey`] when the
    /// owner already has a row for the same experiment and key.
    async fn insert(
        &self,
        record: &NewExperimentData,
    ) -> Result<ExperimentData, ExperimentDataRepositoryError>;

    /// Apply the present `fields` to the owner's row, refreshing
    /// `modified_at`. Returns `None` when no such row exists.
    async fn update(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
        fields: &ExperimentFields,
    ) -> Result<Option<ExperimentData>, ExperimentDataRepositoryError>;

    /// Delete the owner's row. Returns whether a row was removed.
    async fn delete(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
    ) -> Result<bool, ExperimentDataRepositoryError>;
}
