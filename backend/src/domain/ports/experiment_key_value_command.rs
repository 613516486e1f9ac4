//! Driving port for experiment key-value writes. Every write is staff only.

use async_trait::async_trait;

use crate::domain::{Error, ExperimentFields, ExperimentKeyValue, ExperimentKeyValueId, User};

/// Write operations on experiment key-values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentKeyValueCommand: Send + Sync {
    /// Create a row from a complete set of fields.
    async fn create(
        &self,
        actor: &User,
        fields: ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error>;

    /// Replace every field of a row.
    async fn update(
        &self,
        actor: &User,
        id: ExperimentKeyValueId,
        fields: ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error>;

    /// Apply the present fields to a row.
    async fn partial_update(
        &self,
        actor: &User,
        id: ExperimentKeyValueId,
        fields: ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error>;

    /// Delete a row.
    async fn delete(&self, actor: &User, id: ExperimentKeyValueId) -> Result<(), Error>;
}
