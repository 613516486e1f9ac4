//! Experiment data domain services.
//!
//! Implements the experiment data driving ports. Every call builds its own
//! [`UpsertResolver`], so resolved users never outlive the request that
//! looked them up.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::error_mapping::map_data_error;
use crate::domain::ports::{
    BulkUpsertItem, CreateExperimentDataRequest, ExperimentDataCommand, ExperimentDataQuery,
    ExperimentDataRepository, UpsertExperimentDataRequest, UserRepository,
};
use crate::domain::{
    Error, ExperimentData, ExperimentDataId, ExperimentFields, ExperimentFilter,
    NewExperimentData, UpsertResolver, User, Username, WriteOutcome,
};

/// Experiment data service implementing the driving ports.
pub struct ExperimentDataService<D: ?Sized, U: ?Sized> {
    data_repo: Arc<D>,
    user_repo: Arc<U>,
}

impl<D: ?Sized, U: ?Sized> Clone for ExperimentDataService<D, U> {
    fn clone(&self) -> Self {
        Self {
            data_repo: Arc::clone(&self.data_repo),
            user_repo: Arc::clone(&self.user_repo),
        }
    }
}

impl<D: ?Sized, U: ?Sized> ExperimentDataService<D, U> {
    /// Create a new service with the given repositories.
    pub fn new(data_repo: Arc<D>, user_repo: Arc<U>) -> Self {
        Self {
            data_repo,
            user_repo,
        }
    }
}

impl<D, U> ExperimentDataService<D, U>
where
    D: ExperimentDataRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    fn resolver(&self) -> UpsertResolver<'_, D, U> {
        UpsertResolver::new(self.data_repo.as_ref(), self.user_repo.as_ref())
    }

    fn not_found(id: ExperimentDataId) -> Error {
        Error::not_found(format!("experiment data {id} not found"))
    }
}

#[async_trait]
impl<D, U> ExperimentDataCommand for ExperimentDataService<D, U>
where
    D: ExperimentDataRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    async fn create(
        &self,
        request: CreateExperimentDataRequest,
    ) -> Result<ExperimentData, Error> {
        let CreateExperimentDataRequest {
            actor,
            on_behalf_of,
            fields,
        } = request;
        let owner = self
            .resolver()
            .resolve_owner(&actor, on_behalf_of.as_ref())
            .await?;
        let (experiment_id, key, value) = fields.into_required()?;
        let record = NewExperimentData {
            owner: owner.id().clone(),
            experiment_id,
            key,
            value,
        };
        let stored = self
            .data_repo
            .insert(&record)
            .await
            .map_err(map_data_error)?;
        info!(record_id = %stored.id, owner = %stored.owner_username, "experiment data created");
        Ok(stored)
    }

    async fn create_or_update(
        &self,
        request: UpsertExperimentDataRequest,
    ) -> Result<WriteOutcome, Error> {
        let UpsertExperimentDataRequest {
            actor,
            record_id,
            on_behalf_of,
            fields,
        } = request;
        let mut resolver = self.resolver();
        let owner = resolver
            .resolve_owner(&actor, on_behalf_of.as_ref())
            .await?;
        let outcome = resolver
            .resolve_and_write(owner.id(), record_id, fields)
            .await?;
        info!(
            record_id = %outcome.record.id,
            created = outcome.created,
            "experiment data written"
        );
        Ok(outcome)
    }

    async fn partial_update(
        &self,
        actor: &User,
        id: ExperimentDataId,
        fields: ExperimentFields,
    ) -> Result<ExperimentData, Error> {
        if fields.is_empty() {
            return self.get(actor, id).await;
        }
        self.data_repo
            .update(actor.id(), id, &fields)
            .await
            .map_err(map_data_error)?
            .ok_or_else(|| Self::not_found(id))
    }

    async fn delete(&self, actor: &User, id: ExperimentDataId) -> Result<(), Error> {
        let removed = self
            .data_repo
            .delete(actor.id(), id)
            .await
            .map_err(map_data_error)?;
        if !removed {
            return Err(Self::not_found(id));
        }
        info!(record_id = %id, "experiment data deleted");
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        actor: &User,
        items: Vec<BulkUpsertItem>,
    ) -> Result<Vec<WriteOutcome>, Error> {
        if !actor.is_staff() {
            return Err(Error::forbidden(
                "only staff may write experiment data in bulk",
            ));
        }
        let mut resolver = self.resolver();
        let targets: Vec<Username> = items
            .iter()
            .filter_map(|item| item.on_behalf_of.clone())
            .collect();
        resolver.prime_users(&targets).await?;
        debug!(items = items.len(), cached = resolver.cache().len(), "bulk upsert primed");

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let owner = resolver
                .resolve_owner(actor, item.on_behalf_of.as_ref())
                .await?;
            let outcome = resolver
                .resolve_and_write(owner.id(), None, item.fields)
                .await?;
            outcomes.push(outcome);
        }
        info!(written = outcomes.len(), "bulk upsert complete");
        Ok(outcomes)
    }
}

#[async_trait]
impl<D, U> ExperimentDataQuery for ExperimentDataService<D, U>
where
    D: ExperimentDataRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    async fn list(
        &self,
        actor: &User,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentData>, Error> {
        self.data_repo
            .list(actor.id(), filter)
            .await
            .map_err(map_data_error)
    }

    async fn get(&self, actor: &User, id: ExperimentDataId) -> Result<ExperimentData, Error> {
        self.data_repo
            .find_by_id(actor.id(), id)
            .await
            .map_err(map_data_error)?
            .ok_or_else(|| Self::not_found(id))
    }
}

#[cfg(test)]
#[path = "experiment_data_service_tests.rs"]
mod tests;
