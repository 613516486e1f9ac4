//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversion into domain types re-validates
//! every column, so a row written outside this service cannot smuggle an
//! invalid value past the domain constructors.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    ExperimentData, ExperimentDataId, ExperimentFields, ExperimentId, ExperimentKey,
    ExperimentKeyValue, ExperimentKeyValueId, ExperimentValue, User, UserId, Username,
};

use super::schema::{experiment_data, experiment_key_values, users};

/// Failure to turn a stored row into a domain value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stored {table} row {id} is invalid: {message}")]
pub(crate) struct RowConversionError {
    pub table: &'static str,
    pub id: String,
    pub message: String,
}

impl RowConversionError {
    fn new(table: &'static str, id: impl ToString, message: impl ToString) -> Self {
        Self {
            table,
            id: id.to_string(),
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// User models
// ---------------------------------------------------------------------------

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
    pub is_active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = RowConversionError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::new(&row.username)
            .map_err(|err| RowConversionError::new("users", row.id, err))?;
        Ok(User::new(UserId::from_uuid(row.id), username)
            .with_staff(row.is_staff)
            .with_active(row.is_active))
    }
}

/// Insertable struct for creating or refreshing user records.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub is_staff: bool,
    pub is_active: bool,
}

impl<'a> From<&'a User> for NewUserRow<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: *user.id().as_uuid(),
            username: user.username().as_ref(),
            is_staff: user.is_staff(),
            is_active: user.is_active(),
        }
    }
}

// ---------------------------------------------------------------------------
// Experiment data models
// ---------------------------------------------------------------------------

/// Row struct for reading from the experiment_data table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = experiment_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ExperimentDataRow {
    pub id: i64,
    pub user_id: Uuid,
    pub experiment_id: i32,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ExperimentDataRow {
    /// Combine the row with its owner's login name.
    pub(crate) fn into_domain(
        self,
        owner_username: String,
    ) -> Result<ExperimentData, RowConversionError> {
        let id = self.id;
        let invalid =
            |err: &dyn ToString| RowConversionError::new("experiment_data", id, err.to_string());
        Ok(ExperimentData {
            id: ExperimentDataId::new(id).map_err(|err| invalid(&err))?,
            owner: UserId::from_uuid(self.user_id),
            owner_username: Username::new(&owner_username).map_err(|err| invalid(&err))?,
            experiment_id: ExperimentId::new(i64::from(self.experiment_id))
                .map_err(|err| invalid(&err))?,
            key: ExperimentKey::new(&self.key).map_err(|err| invalid(&err))?,
            value: ExperimentValue::new(self.value).map_err(|err| invalid(&err))?,
            created_at: self.created_at,
            modified_at: self.modified_at,
        })
    }
}

/// Insertable struct for creating experiment data rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = experiment_data)]
pub(crate) struct NewExperimentDataRow<'a> {
    pub user_id: Uuid,
    pub experiment_id: i32,
    pub key: &'a str,
    pub value: &'a str,
}

// ---------------------------------------------------------------------------
// Experiment key-value models
// ---------------------------------------------------------------------------

/// Row struct for reading from the experiment_key_values table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = experiment_key_values)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ExperimentKeyValueRow {
    pub id: i64,
    pub experiment_id: i32,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl TryFrom<ExperimentKeyValueRow> for ExperimentKeyValue {
    type Error = RowConversionError;

    fn try_from(row: ExperimentKeyValueRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let invalid = |err: &dyn ToString| {
            RowConversionError::new("experiment_key_values", id, err.to_string())
        };
        Ok(ExperimentKeyValue {
            id: ExperimentKeyValueId::new(row.id).map_err(|err| invalid(&err))?,
            experiment_id: ExperimentId::new(i64::from(row.experiment_id))
                .map_err(|err| invalid(&err))?,
            key: ExperimentKey::new(&row.key).map_err(|err| invalid(&err))?,
            value: ExperimentValue::new(row.value).map_err(|err| invalid(&err))?,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}

/// Insertable struct for creating experiment key-value rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = experiment_key_values)]
pub(crate) struct NewExperimentKeyValueRow<'a> {
    pub experiment_id: i32,
    pub key: &'a str,
    pub value: &'a str,
}

// ---------------------------------------------------------------------------
// Shared changesets
// ---------------------------------------------------------------------------

/// Changeset for `experiment_data` built from optional domain fields.
///
/// `modified_at` is always set so every write refreshes it.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = experiment_data)]
pub(crate) struct ExperimentDataChangeset<'a> {
    pub experiment_id: Option<i32>,
    pub key: Option<&'a str>,
    pub value: Option<&'a str>,
    pub modified_at: DateTime<Utc>,
}

impl<'a> ExperimentDataChangeset<'a> {
    pub(crate) fn from_fields(fields: &'a ExperimentFields, now: DateTime<Utc>) -> Self {
        Self {
            experiment_id: fields.experiment_id.map(ExperimentId::get),
            key: fields.key.as_ref().map(ExperimentKey::as_str),
            value: fields.value.as_ref().map(ExperimentValue::as_str),
            modified_at: now,
        }
    }
}

/// Changeset for `experiment_key_values` built from optional domain fields.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = experiment_key_values)]
pub(crate) struct ExperimentKeyValueChangeset<'a> {
    pub experiment_id: Option<i32>,
    pub key: Option<&'a str>,
    pub value: Option<&'a str>,
    pub modified_at: DateTime<Utc>,
}

impl<'a> ExperimentKeyValueChangeset<'a> {
    pub(crate) fn from_fields(fields: &'a ExperimentFields, now: DateTime<Utc>) -> Self {
        Self {
            experiment_id: fields.experiment_id.map(ExperimentId::get),
            key: fields.key.as_ref().map(ExperimentKey::as_str),
            value: fields.value.as_ref().map(ExperimentValue::as_str),
            modified_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn data_row(experiment_id: i32, key: &str) -> ExperimentDataRow {
        ExperimentDataRow {
            id: 4,
            user_id: Uuid::new_v4(),
            experiment_id,
            key: key.to_owned(),
            value: "v".to_owned(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[rstest]
    fn data_row_converts_with_owner_name() {
        let row = data_row(12, "seen");
        let user_id = row.user_id;
        let record = row.into_domain("alice".to_owned()).expect("valid row");

        assert_eq!(record.id.get(), 4);
        assert_eq!(record.owner.as_uuid(), &user_id);
        assert_eq!(record.owner_username.as_ref(), "alice");
    }

    #[rstest]
    #[case::zero_experiment(0, "seen")]
    #[case::blank_key(1, "   ")]
    fn invalid_data_rows_are_rejected(#[case] experiment_id: i32, #[case] key: &str) {
        let error = data_row(experiment_id, key)
            .into_domain("alice".to_owned())
            .expect_err("invalid row");
        assert_eq!(error.table, "experiment_data");
    }

    #[rstest]
    fn user_row_round_trips_flags() {
        let row = UserRow {
            id: Uuid::new_v4(),
            username: "staffer".to_owned(),
            is_staff: true,
            is_active: false,
        };
        let user = User::try_from(row).expect("valid row");
        assert!(user.is_staff());
        assert!(!user.is_active());
    }

    #[rstest]
    fn changeset_only_carries_present_fields() {
        let fields = ExperimentFields {
            value: Some(ExperimentValue::new("x").expect("valid value")),
            ..ExperimentFields::default()
        };
        let changeset = ExperimentDataChangeset::from_fields(&fields, Utc::now());
        assert_eq!(changeset.experiment_id, None);
        assert_eq!(changeset.key, None);
        assert_eq!(changeset.value, Some("x"));
    }
}
