//! Driving port for reading experiment key-values. Reads need no principal.

use async_trait::async_trait;

use crate::domain::{Error, ExperimentFilter, ExperimentKeyValue, ExperimentKeyValueId};

/// Read operations on experiment key-values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentKeyValueQuery: Send + Sync {
    /// List rows passing `filter`.
    async fn list(&self, filter: &ExperimentFilter) -> Result<Vec<ExperimentKeyValue>, Error>;

    /// Fetch a row by identity.
    async fn get(&self, id: ExperimentKeyValueId) -> Result<ExperimentKeyValue, Error>;
}
