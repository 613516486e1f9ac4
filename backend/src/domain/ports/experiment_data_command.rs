//! Driving port for experiment data writes.
//!
//! Inbound adapters hand over an authenticated actor plus validated fields;
//! implementations decide ownership, resolve create-or-update, and enforce the
//! staff-only rules for writing on behalf of other users.

use async_trait::async_trait;

use crate::domain::{
    Error, ExperimentData, ExperimentDataId, ExperimentFields, User, Username, WriteOutcome,
};

/// Plain creation request (`POST`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateExperimentDataRequest {
    /// Authenticated caller.
    pub actor: User,
    /// Owner to write for instead of the actor. Staff only.
    pub on_behalf_of: Option<Username>,
    /// Submitted fields; all three are required.
    pub fields: ExperimentFields,
}

/// Create-or-update request (`PUT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertExperimentDataRequest {
    /// Authenticated caller.
    pub actor: User,
    /// Explicit row to update, taken from the request path.
    pub record_id: Option<ExperimentDataId>,
    /// Owner to write for instead of the actor. Staff only.
    pub on_behalf_of: Option<Username>,
    /// Submitted fields.
    pub fields: ExperimentFields,
}

/// One element of a bulk create-or-update batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpsertItem {
    /// Owner of the row; defaults to the actor.
    pub on_behalf_of: Option<Username>,
    /// Submitted fields.
    pub fields: ExperimentFields,
}

/// Write operations on experiment data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExperimentDataCommand: Send + Sync {
    /// Create a row. A clash with an existing row is a conflict.
    async fn create(&self, request: CreateExperimentDataRequest)
    -> Result<ExperimentData, Error>;

    /// Update the addressed or matching row, or create one.
    async fn create_or_update(
        &self,
        request: UpsertExperimentDataRequest,
    ) -> Result<WriteOutcome, Error>;

    /// Apply the present fields to one of the actor's rows.
    async fn partial_update(
        &self,
        actor: &User,
        id: ExperimentDataId,
        fields: ExperimentFields,
    ) -> Result<ExperimentData, Error>;

    /// Delete one of the actor's rows.
    async fn delete(&self, actor: &User, id: ExperimentDataId) -> Result<(), Error>;

    /// Run create-or-update for every item in order. Staff only.
    ///
    /// Stops at the first failing item; earlier writes are kept.
    async fn bulk_upsert(
        &self,
        actor: &User,
        items: Vec<BulkUpsertItem>,
    ) -> Result<Vec<WriteOutcome>, Error>;
}
