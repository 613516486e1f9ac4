//! PostgreSQL-backed `ExperimentKeyValueRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{ExperimentKeyValueRepository, ExperimentKeyValueRepositoryError};
use crate::domain::{
    ExperimentFields, ExperimentFilter, ExperimentKeyValue, ExperimentKeyValueId,
    NewExperimentKeyValue,
};

use super::diesel_error_mapping::ErrorConstructors;
use super::models::{ExperimentKeyValueChangeset, ExperimentKeyValueRow, NewExperimentKeyValueRow};
use super::pool::DbPool;
use super::schema::experiment_key_values;

const ERRORS: ErrorConstructors<ExperimentKeyValueRepositoryError> = ErrorConstructors {
    connection: |message| ExperimentKeyValueRepositoryError::connection(message),
    query: |message| ExperimentKeyValueRepositoryError::query(message),
    duplicate: |message| ExperimentKeyValueRepositoryError::duplicate_key(message),
};

type Error = ExperimentKeyValueRepositoryError;

/// Diesel-backed experiment key-value storage.
#[derive(Clone)]
pub struct DieselExperimentKeyValueRepository {
    pool: DbPool,
}

impl DieselExperimentKeyValueRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_domain(row: ExperimentKeyValueRow) -> Result<ExperimentKeyValue, Error> {
    ExperimentKeyValue::try_from(row).map_err(|err| ERRORS.row(err))
}

#[async_trait]
impl ExperimentKeyValueRepository for DieselExperimentKeyValueRepository {
    async fn find_by_id(
        &self,
        id: ExperimentKeyValueId,
    ) -> Result<Option<ExperimentKeyValue>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        experiment_key_values::table
            .find(id.get())
            .select(ExperimentKeyValueRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| ERRORS.diesel(err))?
            .map(to_domain)
            .transpose()
    }

    async fn list(&self, filter: &ExperimentFilter) -> Result<Vec<ExperimentKeyValue>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let mut query = experiment_key_values::table
            .select(ExperimentKeyValueRow::as_select())
            .order(experiment_key_values::id.asc())
            .into_boxed();
        if let Some(experiment_id) = filter.experiment_id {
            query = query.filter(experiment_key_values::experiment_id.eq(experiment_id.get()));
        }
        if let Some(key) = &filter.key {
            query = query.filter(experiment_key_values::key.eq(key.as_str().to_owned()));
        }
        query
            .load(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn insert(&self, record: &NewExperimentKeyValue) -> Result<ExperimentKeyValue, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let row = NewExperimentKeyValueRow {
            experiment_id: record.experiment_id.get(),
            key: record.key.as_str(),
            value: record.value.as_str(),
        };
        let stored = diesel::insert_into(experiment_key_values::table)
            .values(&row)
            .returning(ExperimentKeyValueRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?;
        to_domain(stored)
    }

    async fn update(
        &self,
        id: ExperimentKeyValueId,
        fields: &ExperimentFields,
    ) -> Result<Option<ExperimentKeyValue>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let changeset = ExperimentKeyValueChangeset::from_fields(fields, Utc::now());
        diesel::update(experiment_key_values::table.find(id.get()))
            .set(&changeset)
            .returning(ExperimentKeyValueRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| ERRORS.diesel(err))?
            .map(to_domain)
            .transpose()
    }

    async fn delete(&self, id: ExperimentKeyValueId) -> Result<bool, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let removed = diesel::delete(experiment_key_values::table.find(id.get()))
            .execute(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?;
        Ok(removed > 0)
    }
}
