//! Driven port for global experiment key-value storage.

use async_trait::async_trait;

use crate::domain::{
    ExperimentFields, ExperimentFilter, ExperimentKeyValue, ExperimentKeyValueId,
    NewExperimentKeyValue,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by experiment key-value repository adapters.
    pub enum ExperimentKeyValueRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "experiment key-value repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "experiment key-value repository query failed: {message}",
        /// The write would create a second row for `(experiment_id, key)`.
        DuplicateKey { message: String } =>
            "experiment key-value already exists: {message}",
    }
}

/// Storage for [`ExperimentKeyValue`] rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentKeyValueRepository: Send + Sync {
    /// Fetch a row by identity.
    async fn find_by_id(
        &self,
        id: ExperimentKeyValueId,
    ) -> Result<Option<ExperimentKeyValue>, ExperimentKeyValueRepositoryError>;

    /// List rows passing `filter`, ordered by identity.
    async fn list(
        &self,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentKeyValue>, ExperimentKeyValueRepositoryError>;

    /// Insert a row, failing with `DuplicateKey` on a natural-key clash.
    async fn insert(
        &self,
        record: &NewExperimentKeyValue,
    ) -> Result<ExperimentKeyValue, ExperimentKeyValueRepositoryError>;

    /// Apply the present `fields`. Returns `None` when the row is absent.
    async fn update(
        &self,
        id: ExperimentKeyValueId,
        fields: &ExperimentFields,
    ) -> Result<Option<ExperimentKeyValue>, ExperimentKeyValueRepositoryError>;

    /// Delete a row. Returns whether a row was removed.
    async fn delete(
        &self,
        id: ExperimentKeyValueId,
    ) -> Result<bool, ExperimentKeyValueRepositoryError>;
}
