//! Create-or-update resolution for experiment data.
//!
//! A write without an explicit identity is matched against the owner's row for
//! the same `(experiment_id, key)`. The storage layer enforces that pair as
//! unique per owner; when an insert loses a race to a concurrent writer the
//! resolver re-reads the winning row and applies the write to it instead.

use tracing::debug;

use super::error_mapping::{map_data_error, map_user_error};
use super::ports::{ExperimentDataRepository, ExperimentDataRepositoryError, UserRepository};
use super::{
    Error, ExperimentData, ExperimentDataId, ExperimentFields, NewExperimentData, User, UserCache,
    UserId, Username,
};

/// Result of a create-or-update: the stored row and whether it is new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub record: ExperimentData,
    pub created: bool,
}

impl WriteOutcome {
    fn created(record: ExperimentData) -> Self {
        Self {
            record,
            created: true,
        }
    }

    fn updated(record: ExperimentData) -> Self {
        Self {
            record,
            created: false,
        }
    }
}

/// Per-call resolver holding borrowed repositories and a private [`UserCache`].
///
/// Build a new resolver for every service call; never share one between
/// requests.
pub struct UpsertResolver<'a, D: ?Sized, U: ?Sized> {
    data: &'a D,
    users: &'a U,
    cache: UserCache,
}

impl<'a, D, U> UpsertResolver<'a, D, U>
where
    D: ExperimentDataRepository + ?Sized,
    U: UserRepository + ?Sized,
{
    /// Create a resolver with an empty cache.
    pub fn new(data: &'a D, users: &'a U) -> Self {
        Self {
            data,
            users,
            cache: UserCache::new(),
        }
    }

    /// Users resolved so far.
    pub fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// Resolve a username, consulting the cache first.
    ///
    /// Misses are not cached, so a later call looks the name up again.
    pub async fn resolve_user(&mut self, username: &Username) -> Result<User, Error> {
        if let Some(user) = self.cache.get(username) {
            return Ok(user.clone());
        }
        let user = self
            .users
            .find_by_username(username)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::not_found(format!("user not found: {username}")))?;
        self.cache.insert(user.clone());
        Ok(user)
    }

    /// Resolve every uncached name in `usernames` with a single query.
    ///
    /// Names that do not exist are left out of the cache.
    pub async fn prime_users(&mut self, usernames: &[Username]) -> Result<(), Error> {
        let missing: Vec<Username> = self
            .cache
            .missing(usernames)
            .into_iter()
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let found = self
            .users
            .find_by_usernames(&missing)
            .await
            .map_err(map_user_error)?;
        debug!(requested = missing.len(), found = found.len(), "primed user cache");
        for user in found {
            self.cache.insert(user);
        }
        Ok(())
    }

    /// Decide whose row a write targets.
    ///
    /// Writing for anyone but yourself requires a staff actor.
    pub async fn resolve_owner(
        &mut self,
        actor: &User,
        on_behalf_of: Option<&Username>,
    ) -> Result<User, Error> {
        match on_behalf_of {
            None => Ok(actor.clone()),
            Some(username) if username == actor.username() => Ok(actor.clone()),
            Some(_) if !actor.is_staff() => Err(Error::forbidden(
                "only staff may write experiment data for other users",
            )),
            Some(username) => self.resolve_user(username).await,
        }
    }

    /// Write `fields` for `owner`, updating the addressed or matching row or
    /// creating a new one.
    ///
    /// - With `explicit_id`, the owner's row with that identity is replaced,
    ///   which needs all three fields; a missing row is `not_found`.
    /// - Otherwise, when both `experiment_id` and `key` are present, the
    ///   owner's matching row is updated if there is one. A match that
    ///   disappears before the update is a `conflict`.
    /// - Otherwise a row is created, which needs all three fields.
    ///
    /// Only "no matching row" leads to creation; every storage failure is
    /// returned as is.
    pub async fn resolve_and_write(
        &self,
        owner: &UserId,
        explicit_id: Option<ExperimentDataId>,
        fields: ExperimentFields,
    ) -> Result<WriteOutcome, Error> {
        if let Some(id) = explicit_id {
            fields.clone().into_required()?;
            return self
                .data
                .update(owner, id, &fields)
                .await
                .map_err(map_data_error)?
                .map(WriteOutcome::updated)
                .ok_or_else(|| Error::not_found(format!("experiment data {id} not found")));
        }

        if let Some((experiment_id, key)) = fields.natural_key() {
            fields.require_value()?;
            let existing = self
                .data
                .find_by_natural_key(owner, experiment_id, key)
                .await
                .map_err(map_data_error)?;
            if let Some(existing) = existing {
                return self.update_matched(owner, existing.id, &fields).await;
            }
        }

        self.create(owner, fields).await
    }

    /// Update a row found by natural key. A row deleted in between is a
    /// `conflict`, never `not_found`.
    async fn update_matched(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
        fields: &ExperimentFields,
    ) -> Result<WriteOutcome, Error> {
        self.data
            .update(owner, id, fields)
            .await
            .map_err(map_data_error)?
            .map(WriteOutcome::updated)
            .ok_or_else(concurrent_change)
    }

    async fn create(&self, owner: &UserId, fields: ExperimentFields) -> Result<WriteOutcome, Error> {
        let (experiment_id, key, value) = fields.clone().into_required()?;
        let record = NewExperimentData {
            owner: owner.clone(),
            experiment_id,
            key,
            value,
        };
        match self.data.insert(&record).await {
            Ok(stored) => Ok(WriteOutcome::created(stored)),
            Err(ExperimentDataRepositoryError::DuplicateKey { message }) => {
                debug!(%message, "insert lost a race, applying write to the winning row");
                self.apply_to_winner(&record, &fields).await
            }
            Err(other) => Err(map_data_error(other)),
        }
    }

    async fn apply_to_winner(
        &self,
        record: &NewExperimentData,
        fields: &ExperimentFields,
    ) -> Result<WriteOutcome, Error> {
        let winner = self
            .data
            .find_by_natural_key(&record.owner, record.experiment_id, &record.key)
            .await
            .map_err(map_data_error)?
            .ok_or_else(concurrent_change)?;
        self.update_matched(&record.owner, winner.id, fields).await
    }
}

fn concurrent_change() -> Error {
    Error::conflict("experiment data changed concurrently; retry the request")
}

#[cfg(test)]
#[path = "upsert_resolver_tests.rs"]
mod tests;
