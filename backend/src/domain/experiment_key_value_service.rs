//! Experiment key-value domain services.
//!
//! Reads are open to every caller. Writes are limited to staff.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::error_mapping::map_key_value_error;
use crate::domain::ports::{
    ExperimentKeyValueCommand, ExperimentKeyValueQuery, ExperimentKeyValueRepository,
};
use crate::domain::{
    Error, ExperimentFields, ExperimentFilter, ExperimentKeyValue, ExperimentKeyValueId,
    NewExperimentKeyValue, User,
};

/// Experiment key-value service implementing the driving ports.
pub struct ExperimentKeyValueService<K: ?Sized> {
    repo: Arc<K>,
}

impl<K: ?Sized> Clone for ExperimentKeyValueService<K> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<K: ?Sized> ExperimentKeyValueService<K> {
    /// Create a new service over `repo`.
    pub fn new(repo: Arc<K>) -> Self {
        Self { repo }
    }
}

impl<K> ExperimentKeyValueService<K>
where
    K: ExperimentKeyValueRepository + ?Sized,
{
    fn require_staff(actor: &User) -> Result<(), Error> {
        if actor.is_staff() {
            Ok(())
        } else {
            Err(Error::forbidden("only staff may modify experiment key-values"))
        }
    }

    fn not_found(id: ExperimentKeyValueId) -> Error {
        Error::not_found(format!("experiment key-value {id} not found"))
    }

    async fn apply(
        &self,
        id: ExperimentKeyValueId,
        fields: &ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error> {
        let updated = self
            .repo
            .update(id, fields)
            .await
            .map_err(map_key_value_error)?
            .ok_or_else(|| Self::not_found(id))?;
        info!(record_id = %id, "experiment key-value updated");
        Ok(updated)
    }
}

#[async_trait]
impl<K> ExperimentKeyValueCommand for ExperimentKeyValueService<K>
where
    K: ExperimentKeyValueRepository + ?Sized,
{
    async fn create(
        &self,
        actor: &User,
        fields: ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error> {
        Self::require_staff(actor)?;
        let (experiment_id, key, value) = fields.into_required()?;
        let stored = self
            .repo
            .insert(&NewExperimentKeyValue {
                experiment_id,
                key,
                value,
            })
            .await
            .map_err(map_key_value_error)?;
        info!(record_id = %stored.id, "experiment key-value created");
        Ok(stored)
    }

    async fn update(
        &self,
        actor: &User,
        id: ExperimentKeyValueId,
        fields: ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error> {
        Self::require_staff(actor)?;
        let (experiment_id, key, value) = fields.into_required()?;
        let complete = ExperimentFields {
            experiment_id: Some(experiment_id),
            key: Some(key),
            value: Some(value),
        };
        self.apply(id, &complete).await
    }

    async fn partial_update(
        &self,
        actor: &User,
        id: ExperimentKeyValueId,
        fields: ExperimentFields,
    ) -> Result<ExperimentKeyValue, Error> {
        Self::require_staff(actor)?;
        if fields.is_empty() {
            return self.get(id).await;
        }
        self.apply(id, &fields).await
    }

    async fn delete(&self, actor: &User, id: ExperimentKeyValueId) -> Result<(), Error> {
        Self::require_staff(actor)?;
        let removed = self.repo.delete(id).await.map_err(map_key_value_error)?;
        if !removed {
            return Err(Self::not_found(id));
        }
        info!(record_id = %id, "experiment key-value deleted");
        Ok(())
    }
}

#[async_trait]
impl<K> ExperimentKeyValueQuery for ExperimentKeyValueService<K>
where
    K: ExperimentKeyValueRepository + ?Sized,
{
    async fn list(&self, filter: &ExperimentFilter) -> Result<Vec<ExperimentKeyValue>, Error> {
        self.repo.list(filter).await.map_err(map_key_value_error)
    }

    async fn get(&self, id: ExperimentKeyValueId) -> Result<ExperimentKeyValue, Error> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(map_key_value_error)?
            .ok_or_else(|| Self::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{ExperimentKeyValueRepositoryError, MockExperimentKeyValueRepository};
    use crate::domain::{ErrorCode, ExperimentId, ExperimentKey, ExperimentValue, UserId, Username};

    fn actor(is_staff: bool) -> User {
        User::new(UserId::random(), Username::new("tester").expect("valid username"))
            .with_staff(is_staff)
    }

    fn fields(value: &str) -> ExperimentFields {
        ExperimentFields {
            experiment_id: Some(ExperimentId::new(3).expect("valid id")),
            key: Some(ExperimentKey::new("banner").expect("valid key")),
            value: Some(ExperimentValue::new(value).expect("valid value")),
        }
    }

    fn stored(id: i64, record: &NewExperimentKeyValue) -> ExperimentKeyValue {
        let now = Utc::now();
        ExperimentKeyValue {
            id: ExperimentKeyValueId::new(id).expect("valid record id"),
            experiment_id: record.experiment_id,
            key: record.key.clone(),
            value: record.value.clone(),
            created_at: now,
            modified_at: now,
        }
    }

    fn record_id(id: i64) -> ExperimentKeyValueId {
        ExperimentKeyValueId::new(id).expect("valid record id")
    }

    #[tokio::test]
    async fn staff_can_create() {
        let mut repo = MockExperimentKeyValueRepository::new();
        repo.expect_insert()
            .times(1)
            .returning(|record| Ok(stored(1, record)));
        let service = ExperimentKeyValueService::new(Arc::new(repo));

        let created = service
            .create(&actor(true), fields("on"))
            .await
            .expect("create succeeds");

        assert_eq!(created.value.as_str(), "on");
    }

    #[rstest]
    #[case::create("create")]
    #[case::update("update")]
    #[case::partial("partial")]
    #[case::delete("delete")]
    #[tokio::test]
    async fn non_staff_writes_are_forbidden(#[case] operation: &str) {
        let mut repo = MockExperimentKeyValueRepository::new();
        repo.expect_insert().never();
        repo.expect_update().never();
        repo.expect_delete().never();
        let service = ExperimentKeyValueService::new(Arc::new(repo));
        let actor = actor(false);

        let error = match operation {
            "create" => service.create(&actor, fields("on")).await.map(|_| ()),
            "update" => service.update(&actor, record_id(1), fields("on")).await.map(|_| ()),
            "partial" => service
                .partial_update(&actor, record_id(1), fields("on"))
                .await
                .map(|_| ()),
            _ => service.delete(&actor, record_id(1)).await,
        }
        .expect_err("forbidden");

        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let mut repo = MockExperimentKeyValueRepository::new();
        repo.expect_insert()
            .times(1)
            .return_once(|_| Err(ExperimentKeyValueRepositoryError::duplicate_key("exists")));
        let service = ExperimentKeyValueService::new(Arc::new(repo));

        let error = service
            .create(&actor(true), fields("on"))
            .await
            .expect_err("conflict");

        assert_eq!(error.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn full_update_requires_every_field() {
        let mut repo = MockExperimentKeyValueRepository::new();
        repo.expect_update().never();
        let service = ExperimentKeyValueService::new(Arc::new(repo));
        let partial = ExperimentFields {
            value: Some(ExperimentValue::new("off").expect("valid value")),
            ..ExperimentFields::default()
        };

        let error = service
            .update(&actor(true), record_id(1), partial)
            .await
            .expect_err("incomplete");

        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn get_missing_row_is_not_found() {
        let mut repo = MockExperimentKeyValueRepository::new();
        repo.expect_find_by_id().times(1).return_once(|_| Ok(None));
        let service = ExperimentKeyValueService::new(Arc::new(repo));

        let error = service.get(record_id(9)).await.expect_err("missing");

        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn list_failure_is_service_unavailable() {
        let mut repo = MockExperimentKeyValueRepository::new();
        repo.expect_list()
            .times(1)
            .return_once(|_| Err(ExperimentKeyValueRepositoryError::connection("down")));
        let service = ExperimentKeyValueService::new(Arc::new(repo));

        let error = service
            .list(&ExperimentFilter::default())
            .await
            .expect_err("unavailable");

        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }
}
