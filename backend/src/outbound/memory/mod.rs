//! In-memory implementations of the repository ports.
//!
//! [`InMemoryExperimentStore`] backs the server when no database URL is
//! configured, and backs behaviour tests. It enforces the same uniqueness
//! rules as the PostgreSQL schema so create-or-update behaves identically on
//! both adapters.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    ExperimentDataRepository, ExperimentDataRepositoryError, ExperimentKeyValueRepository,
    ExperimentKeyValueRepositoryError, UserPersistenceError, UserRepository,
};
use crate::domain::{
    ExperimentData, ExperimentDataId, ExperimentFields, ExperimentFilter, ExperimentId,
    ExperimentKey, ExperimentKeyValue, ExperimentKeyValueId, ExperimentValue, NewExperimentData,
    NewExperimentKeyValue, User, UserId, Username,
};


const POISONED: &str = "in-memory store lock poisoned";

#[derive(Debug, Clone)]
struct DataRow {
    owner: UserId,
    experiment_id: ExperimentId,
    key: ExperimentKey,
    value: ExperimentValue,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    data: BTreeMap<i64, DataRow>,
    key_values: BTreeMap<i64, ExperimentKeyValue>,
    next_data_id: i64,
    next_key_value_id: i64,
}

impl State {
    fn data_record(&self, id: i64, row: &DataRow) -> Result<ExperimentData, ExperimentDataRepositoryError> {
        let owner = self.users.get(&row.owner).ok_or_else(|| {
            ExperimentDataRepositoryError::query(format!("owner of row {id} is missing"))
        })?;
        let id = ExperimentDataId::new(id)
            .map_err(|err| ExperimentDataRepositoryError::query(err.to_string()))?;
        Ok(ExperimentData {
            id,
            owner: row.owner.clone(),
            owner_username: owner.username().clone(),
            experiment_id: row.experiment_id,
            key: row.key.clone(),
            value: row.value.clone(),
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }

    fn data_clash(
        &self,
        owner: &UserId,
        experiment_id: ExperimentId,
        key: &ExperimentKey,
        except: Option<i64>,
    ) -> bool {
        self.data.iter().any(|(id, row)| {
            Some(*id) != except
                && &row.owner == owner
                && row.experiment_id == experiment_id
                && &row.key == key
        })
    }

    fn key_value_clash(&self, experiment_id: ExperimentId, key: &ExperimentKey, except: Option<i64>) -> bool {
        self.key_values.iter().any(|(id, row)| {
            Some(*id) != except && row.experiment_id == experiment_id && &row.key == key
        })
    }
}

/// Thread-safe in-memory store implementing every repository port.
#[derive(Debug, Default)]
pub struct InMemoryExperimentStore {
    state: Mutex<State>,
}

impl InMemoryExperimentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Option<MutexGuard<'_, State>> {
        self.state.lock().ok()
    }
}

#[async_trait]
impl UserRepository for InMemoryExperimentStore {
    async fn upsert(&self, user: &User) -> Result<(), UserPersistenceError> {
        let mut state = self.lock().ok_or_else(|| UserPersistenceError::query(POISONED))?;
        let clash = state
            .users
            .values()
            .any(|existing| existing.username() == user.username() && existing.id() != user.id());
        if clash {
            return Err(UserPersistenceError::query(format!(
                "username {} is taken",
                user.username()
            )));
        }
        state.users.insert(user.id().clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError> {
        let state = self.lock().ok_or_else(|| UserPersistenceError::query(POISONED))?;
        Ok(state.users.get(id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, UserPersistenceError> {
        let state = self.lock().ok_or_else(|| UserPersistenceError::query(POISONED))?;
        Ok(state
            .users
            .values()
            .find(|user| user.username() == username)
            .cloned())
    }

    async fn find_by_usernames(
        &self,
        usernames: &[Username],
    ) -> Result<Vec<User>, UserPersistenceError> {
        let state = self.lock().ok_or_else(|| UserPersistenceError::query(POISONED))?;
        Ok(state
            .users
            .values()
            .filter(|user| usernames.contains(user.username()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExperimentDataRepository for InMemoryExperimentStore {
    async fn find_by_id(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
    ) -> Result<Option<ExperimentData>, ExperimentDataRepositoryError> {
        let state = self
            .lock()
            .ok_or_else(|| ExperimentDataRepositoryError::query(POISONED))?;
        state
            .data
            .get(&id.get())
            .filter(|row| &row.owner == owner)
            .map(|row| state.data_record(id.get(), row))
            .transpose()
    }

    async fn find_by_natural_key(
        &self,
        owner: &UserId,
        experiment_id: ExperimentId,
        key: &ExperimentKey,
    ) -> Result<Option<ExperimentData>, ExperimentDataRepositoryError> {
        let state = self
            .lock()
            .ok_or_else(|| ExperimentDataRepositoryError::query(POISONED))?;
        state
            .data
            .iter()
            .find(|(_, row)| {
                &row.owner == owner && row.experiment_id == experiment_id && &row.key == key
            })
            .map(|(id, row)| state.data_record(*id, row))
            .transpose()
    }

    async fn list(
        &self,
        owner: &UserId,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentData>, ExperimentDataRepositoryError> {
        let state = self
            .lock()
            .ok_or_else(|| ExperimentDataRepositoryError::query(POISONED))?;
        state
            .data
            .iter()
            .filter(|(_, row)| &row.owner == owner && filter.matches(row.experiment_id, &row.key))
            .map(|(id, row)| state.data_record(*id, row))
            .collect()
    }

    async fn insert(
        &self,
        record: &NewExperimentData,
    ) -> Result<ExperimentData, ExperimentDataRepositoryError> {
        let mut state = self
            .lock()
            .ok_or_else(|| ExperimentDataRepositoryError::query(POISONED))?;
        if !state.users.contains_key(&record.owner) {
            return Err(ExperimentDataRepositoryError::query(format!(
                "owner {} does not exist",
                record.owner
            )));
        }
        if state.data_clash(&record.owner, record.experiment_id, &record.key, None) {
            return Err(ExperimentDataRepositoryError::duplicate_key(
                "experiment_data_owner_key_unique",
            ));
        }
        state.next_data_id += 1;
        let id = state.next_data_id;
        let now = Utc::now();
        let row = DataRow {
            owner: record.owner.clone(),
            experiment_id: record.experiment_id,
            key: record.key.clone(),
            value: record.value.clone(),
            created_at: now,
            modified_at: now,
        };
        let stored = state.data_record(id, &row)?;
        state.data.insert(id, row);
        Ok(stored)
    }

    async fn update(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
        fields: &ExperimentFields,
    ) -> Result<Option<ExperimentData>, ExperimentDataRepositoryError> {
        let mut state = self
            .lock()
            .ok_or_else(|| ExperimentDataRepositoryError::query(POISONED))?;
        let Some(current) = state.data.get(&id.get()).filter(|row| &row.owner == owner) else {
            return Ok(None);
        };
        let mut next = current.clone();
        if let Some(experiment_id) = fields.experiment_id {
            next.experiment_id = experiment_id;
        }
        if let Some(key) = &fields.key {
            next.key = key.clone();
        }
        if let Some(value) = &fields.value {
            next.value = value.clone();
        }
        if state.data_clash(owner, next.experiment_id, &next.key, Some(id.get())) {
            return Err(ExperimentDataRepositoryError::duplicate_key(
                "experiment_data_owner_key_unique",
            ));
        }
        next.modified_at = Utc::now();
        let stored = state.data_record(id.get(), &next)?;
        state.data.insert(id.get(), next);
        Ok(Some(stored))
    }

    async fn delete(
        &self,
        owner: &UserId,
        id: ExperimentDataId,
    ) -> Result<bool, ExperimentDataRepositoryError> {
        let mut state = self
            .lock()
            .ok_or_else(|| ExperimentDataRepositoryError::query(POISONED))?;
        let owned = state
            .data
            .get(&id.get())
            .is_some_and(|row| &row.owner == owner);
        if owned {
            state.data.remove(&id.get());
        }
        Ok(owned)
    }
}

#[async_trait]
impl ExperimentKeyValueRepository for InMemoryExperimentStore {
    async fn find_by_id(
        &self,
        id: ExperimentKeyValueId,
    ) -> Result<Option<ExperimentKeyValue>, ExperimentKeyValueRepositoryError> {
        let state = self
            .lock()
            .ok_or_else(|| ExperimentKeyValueRepositoryError::query(POISONED))?;
        Ok(state.key_values.get(&id.get()).cloned())
    }

    async fn list(
        &self,
        filter: &ExperimentFilter,
    ) -> Result<Vec<ExperimentKeyValue>, ExperimentKeyValueRepositoryError> {
        let state = self
            .lock()
            .ok_or_else(|| ExperimentKeyValueRepositoryError::query(POISONED))?;
        Ok(state
            .key_values
            .values()
            .filter(|row| filter.matches(row.experiment_id, &row.key))
            .cloned()
            .collect())
    }

    async fn insert(
        &self,
        record: &NewExperimentKeyValue,
    ) -> Result<ExperimentKeyValue, ExperimentKeyValueRepositoryError> {
        let mut state = self
            .lock()
            .ok_or_else(|| ExperimentKeyValueRepositoryError::query(POISONED))?;
        if state.key_value_clash(record.experiment_id, &record.key, None) {
            return Err(ExperimentKeyValueRepositoryError::duplicate_key(
                "experiment_key_values_key_unique",
            ));
        }
        state.next_key_value_id += 1;
        let id = ExperimentKeyValueId::new(state.next_key_value_id)
            .map_err(|err| ExperimentKeyValueRepositoryError::query(err.to_string()))?;
        let now = Utc::now();
        let stored = ExperimentKeyValue {
            id,
            experiment_id: record.experiment_id,
            key: record.key.clone(),
            value: record.value.clone(),
            created_at: now,
            modified_at: now,
        };
        state.key_values.insert(id.get(), stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        id: ExperimentKeyValueId,
        fields: &ExperimentFields,
    ) -> Result<Option<ExperimentKeyValue>, ExperimentKeyValueRepositoryError> {
        let mut state = self
            .lock()
            .ok_or_else(|| ExperimentKeyValueRepositoryError::query(POISONED))?;
        let Some(current) = state.key_values.get(&id.get()) else {
            return Ok(None);
        };
        let mut next = current.clone();
        if let Some(experiment_id) = fields.experiment_id {
            next.experiment_id = experiment_id;
        }
        if let Some(key) = &fields.key {
            next.key = key.clone();
        }
        if let Some(value) = &fields.value {
            next.value = value.clone();
        }
        if state.key_value_clash(next.experiment_id, &next.key, Some(id.get())) {
            return Err(ExperimentKeyValueRepositoryError::duplicate_key(
                "experiment_key_values_key_unique",
            ));
        }
        next.modified_at = Utc::now();
        state.key_values.insert(id.get(), next.clone());
        Ok(Some(next))
    }

    async fn delete(
        &self,
        id: ExperimentKeyValueId,
    ) -> Result<bool, ExperimentKeyValueRepositoryError> {
        let mut state = self
            .lock()
            .ok_or_else(|| ExperimentKeyValueRepositoryError::query(POISONED))?;
        Ok(state.key_values.remove(&id.get()).is_some())
    }
}
