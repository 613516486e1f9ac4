//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{UserPersistenceError, UserRepository};
use crate::domain::{User, UserId, Username};

use super::diesel_error_mapping::ErrorConstructors;
use super::models::{NewUserRow, UserRow};
use super::pool::DbPool;
use super::schema::users;

const ERRORS: ErrorConstructors<UserPersistenceError> = ErrorConstructors {
    connection: |message| UserPersistenceError::connection(message),
    query: |message| UserPersistenceError::query(message),
    // Only a username clash can violate a constraint on upsert.
    duplicate: |constraint| UserPersistenceError::query(format!("duplicate user: {constraint}")),
};

/// Diesel-backed user accounts.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_domain(row: UserRow) -> Result<User, UserPersistenceError> {
    User::try_from(row).map_err(|err| ERRORS.row(err))
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn upsert(&self, user: &User) -> Result<(), UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        let row = NewUserRow::from(user);

        diesel::insert_into(users::table)
            .values(&row)
            .on_conflict(users::id)
            .do_update()
            .set((
                users::username.eq(excluded(users::username)),
                users::is_staff.eq(excluded(users::is_staff)),
                users::is_active.eq(excluded(users::is_active)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?;
        debug!(user_id = %user.id(), "user upserted");
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| ERRORS.diesel(err))?
            .map(to_domain)
            .transpose()
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        users::table
            .filter(users::username.eq(username.as_ref()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| ERRORS.diesel(err))?
            .map(to_domain)
            .transpose()
    }

    async fn find_by_usernames(
        &self,
        usernames: &[Username],
    ) -> Result<Vec<User>, UserPersistenceError> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<&str> = usernames.iter().map(AsRef::as_ref).collect();
        let mut conn = self.pool.get().await.map_err(|err| ERRORS.pool(err))?;
        users::table
            .filter(users::username.eq_any(names))
            .select(UserRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| ERRORS.diesel(err))?
            .into_iter()
            .map(to_domain)
            .collect()
    }
}
