//! PostgreSQL-backed `ExperimentDataRepository` implementation using Diesel ORM.
//!
//! Reads join `users` so each row carries its owner's login name. Inserts rely
//! on the `(user_id, experiment_id, key)` unique constraint; a violation
//! surfaces as `DuplicateKey` for the domain to resolve.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{ExperimentDataRepository, ExperimentDataRepositoryError};
use crate::domain::{
    ExperimentData, ExperimentDataId, ExperimentFields, ExperimentFilter, ExperimentId,
    ExperimentKey, NewExperimentData, UserId,
};

use super::diesel_error_mapping::ErrorConstructors;
use super::models::{ExperimentDataChangeset, ExperimentDataRow, NewExperimentDataRow};
use super::pool::DbPool;
use super::schema::{experiment_data, users};

const ERRORS: ErrorConstructors<ExperimentDataRepositoryError> = ErrorConstructors {
    connection: |message| ExperimentDataRepositoryError::connection(message),
    query: |message| ExperimentDataRepositoryError::query(message),
    duplicate: |message| ExperimentDataRepositoryError::duplicate_key(message),
};

type Error = ExperimentDataRepositoryError;

/// Diesel-backed experiment data storage.
#[derive(Clone)]
pub struct DieselExperimentDataRepository {
    pool: DbPool,
}

impl DieselExperimentDataRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_domain((row, username): (ExperimentDataRow, String)) -> Result<ExperimentData, Error> {
    row.into_domain(username).map_err(|err| ERRORS.row(err))
}

async fn owner_username(conn: &mut AsyncPgConnection, owner: Uuid) -> Result<String, Error> {
    users::table
        .find(owner)
        .select(users::username)
        .first(conn)
        .await
        .map_err(|err| ERRORS.diesel(err))
}

async fn find_joined(
    conn: &mut AsyncPgConnection,
    owner: &UserId,
    id: i64,
) -> Result<Option<ExperimentData>, Error> {
    experiment_data::table
        .inner_join(users::table)
        .filter(experiment_data::id.eq(id))
        .filter(experiment_data::user_id.eq(owner.as_uuid()))
        .select((ExperimentDataRow::as_select(), users::username))
        .first::<(ExperimentDataRow, String)>(conn)
        .await
        .optional()
        .map_err(|err| ERRORS.diesel(err))?
        .map(to_domain)
        .transpose()
}

#[async_trait]
impl ExperimentDataRepository for DieselExperimentDataRepository {
    async fn find_by_id(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
    ) -> Result<Option<ExperimentData>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        find_joined(&mut conn, owner, id.get()).await
    }

    async fn find_by_natural_key(
        &self,
        owner: &UserId,
        experiment_id: ExperimentId,
        key: &ExperimentKey,
    ) -> Result<Option<ExperimentData>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        experiment_data::table
            .inner_join(users::table)
            .filter(experiment_data::user_id.eq(owner.as_uuid()))
            .filter(experiment_data::experiment_id.eq(experiment_id.get()))
            .filter(experiment_data::key.eq(key.as_str()))
            .select((ExperimentDataRow::as_select(), users::username))
            .first::<(ExperimentDataRow, String)>(&mut conn)
            .await
            .optional()
            .map_err(|err| ERRORS.diesel(err))?
            .map(to_domain)
            .transpose()
    }

    async fn list(
        &self,
        owner: &UserId,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentData>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let mut query = experiment_data::table
            .inner_join(users::table)
            .filter(experiment_data::user_id.eq(*owner.as_uuid()))
            .select((ExperimentDataRow::as_select(), users::username))
            .order(experiment_data::id.asc())
            .into_boxed();
        if let Some(experiment_id) = filter.experiment_id {
            query = query.filter(experiment_data::experiment_id.eq(experiment_id.get()));
        }
        if let Some(key) = &filter.key {
            query = query.filter(experiment_data::key.eq(key.as_str().to_owned()));
        }
        query
            .load::<(ExperimentDataRow, String)>(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn insert(&self, record: &NewExperimentData) -> Result<ExperimentData, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let owner = *record.owner.as_uuid();
        let row = NewExperimentDataRow {
            user_id: owner,
            experiment_id: record.experiment_id.get(),
            key: record.key.as_str(),
            value: record.value.as_str(),
        };
        let stored = diesel::insert_into(experiment_data::table)
            .values(&row)
            .returning(ExperimentDataRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?;
        let username = owner_username(&mut conn, owner).await?;
        to_domain((stored, username))
    }

    async fn update(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
        fields: &ExperimentFields,
    ) -> Result<Option<ExperimentData>, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let changeset = ExperimentDataChangeset::from_fields(fields, Utc::now());
        let updated = diesel::update(
            experiment_data::table
                .filter(experiment_data::id.eq(id.get()))
                .filter(experiment_data::user_id.eq(owner.as_uuid())),
        )
        .set(&changeset)
        .returning(ExperimentDataRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|err| ERRORS.diesel(err))?;
        let Some(row) = updated else {
            return Ok(None);
        };
        let username = owner_username(&mut conn, row.user_id).await?;
        to_domain((row, username)).map(Some)
    }

    async fn delete(&self, owner: &UserId, id: ExperimentDataId) -> Result<bool, Error> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let removed = diesel::delete(
            experiment_data::table
                .filter(experiment_data::id.eq(id.get()))
                .filter(experiment_data::user_id.eq(owner.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(|err| ERRORS.diesel(err))?;
        Ok(removed > 0)
    }
}
