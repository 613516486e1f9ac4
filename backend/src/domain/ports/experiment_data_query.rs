//! Driving port for reading experiment data.

use async_trait::async_trait;

use crate::domain::{Error, ExperimentData, ExperimentDataId, ExperimentFilter, User};

/// Read operations on experiment data, always scoped to the actor's rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentDataQuery: Send + Sync {
    /// List the actor's rows passing `filter`.
    async fn list(
        &self,
        actor: &User,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentData>, Error>;

    /// Fetch one of the actor's rows.
    async fn get(&self, actor: &User, id: ExperimentDataId) -> Result<ExperimentData, Error>;
}
