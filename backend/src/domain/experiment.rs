//! Experiment data and experiment key-value entities.
//!
//! Experiment data rows are owned by a user and keyed by
//! `(owner, experiment_id, key)`. Key-values are global and keyed by
//! `(experiment_id, key)`. Both carry an opaque text value.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Error, UserId, Username};

/// Largest experiment identifier accepted (positive small integer range).
pub const EXPERIMENT_ID_MAX: i32 = 32_767;
/// Maximum key length in characters.
pub const EXPERIMENT_KEY_MAX: usize = 255;

/// Validation errors for experiment values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExperimentValidationError {
    /// Experiment identifier outside `1..=EXPERIMENT_ID_MAX`.
    #[error("experiment_id must be between 1 and {max}")]
    ExperimentIdOutOfRange {
        /// Largest accepted identifier.
        max: i32,
    },
    /// Key was blank.
    #[error("key must not be empty")]
    EmptyKey,
    /// Key exceeded [`EXPERIMENT_KEY_MAX`].
    #[error("key must be at most {max} characters")]
    KeyTooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// Value was blank.
    #[error("value must not be empty")]
    EmptyValue,
    /// Record identifier was not positive.
    #[error("record id must be a positive integer")]
    InvalidRecordId,
}

/// Numbered experiment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ExperimentId(i32);

impl ExperimentId {
    /// Validate and construct an [`ExperimentId`].
    ///
    /// # Examples
    /// ```
    /// use experiments::domain::ExperimentId;
    ///
    /// assert_eq!(ExperimentId::new(42).unwrap().get(), 42);
    /// assert!(ExperimentId::new(0).is_err());
    /// ```
    pub fn new(value: i64) -> Result<Self, ExperimentValidationError> {
        i32::try_from(value)
            .ok()
            .filter(|id| (1..=EXPERIMENT_ID_MAX).contains(id))
            .map(Self)
            .ok_or(ExperimentValidationError::ExperimentIdOutOfRange {
                max: EXPERIMENT_ID_MAX,
            })
    }

    /// Raw identifier.
    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<ExperimentId> for i32 {
    fn from(value: ExperimentId) -> Self {
        value.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Key naming one fact within an experiment.
///
/// ## Invariants
/// - Trimmed and non-empty.
/// - At most [`EXPERIMENT_KEY_MAX`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentKey(String);

impl ExperimentKey {
    /// Validate and construct an [`ExperimentKey`].
    pub fn new(value: impl AsRef<str>) -> Result<Self, ExperimentValidationError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ExperimentValidationError::EmptyKey);
        }
        if trimmed.chars().count() > EXPERIMENT_KEY_MAX {
            return Err(ExperimentValidationError::KeyTooLong {
                max: EXPERIMENT_KEY_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for ExperimentKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl TryFrom<String> for ExperimentKey {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentKey> for String {
    fn from(value: ExperimentKey) -> Self {
        value.0
    }
}

/// Opaque stored value. Kept verbatim; only blank values are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentValue(String);

impl ExperimentValue {
    /// Validate and construct an [`ExperimentValue`].
    pub fn new(value: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ExperimentValidationError::EmptyValue);
        }
        Ok(Self(value))
    }

    /// Borrow the value as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for ExperimentValue {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for ExperimentValue {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentValue> for String {
    fn from(value: ExperimentValue) -> Self {
        value.0
    }
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Validate and construct the identifier.
            pub fn new(value: i64) -> Result<Self, ExperimentValidationError> {
                if value < 1 {
                    return Err(ExperimentValidationError::InvalidRecordId);
                }
                Ok(Self(value))
            }

            /// Raw identifier.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ExperimentValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

record_id! {
    /// Storage-assigned identity of an [`ExperimentData`] row.
    ExperimentDataId
}

record_id! {
    /// Storage-assigned identity of an [`ExperimentKeyValue`] row.
    ExperimentKeyValueId
}

/// One user-scoped experiment fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentData {
    pub id: ExperimentDataId,
    pub owner: UserId,
    pub owner_username: Username,
    pub experiment_id: ExperimentId,
    pub key: ExperimentKey,
    pub value: ExperimentValue,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Insert payload for a new experiment data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExperimentData {
    pub owner: UserId,
    pub experiment_id: ExperimentId,
    pub key: ExperimentKey,
    pub value: ExperimentValue,
}

/// One global experiment fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentKeyValue {
    pub id: ExperimentKeyValueId,
    pub experiment_id: ExperimentId,
    pub key: ExperimentKey,
    pub value: ExperimentValue,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Insert payload for a new experiment key-value row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExperimentKeyValue {
    pub experiment_id: ExperimentId,
    pub key: ExperimentKey,
    pub value: ExperimentValue,
}

/// Writable fields of either entity. Absent fields are left untouched on
/// update and reported as missing on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentFields {
    pub experiment_id: Option<ExperimentId>,
    pub key: Option<ExperimentKey>,
    pub value: Option<ExperimentValue>,
}

impl ExperimentFields {
    /// The `(experiment_id, key)` pair when both are present.
    pub fn natural_key(&self) -> Option<(ExperimentId, &ExperimentKey)> {
        Some((self.experiment_id?, self.key.as_ref()?))
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.experiment_id.is_none() && self.key.is_none() && self.value.is_none()
    }

    /// Fail with a `missing_field` error unless `value` is present.
    pub fn require_value(&self) -> Result<(), Error> {
        match self.value {
            Some(_) => Ok(()),
            None => Err(missing_field("value")),
        }
    }

    /// Split into the three fields required for creation.
    ///
    /// Missing fields are reported in declaration order.
    pub fn into_required(self) -> Result<(ExperimentId, ExperimentKey, ExperimentValue), Error> {
        let experiment_id = self.experiment_id.ok_or_else(|| missing_field("experiment_id"))?;
        let key = self.key.ok_or_else(|| missing_field("key"))?;
        let value = self.value.ok_or_else(|| missing_field("value"))?;
        Ok((experiment_id, key, value))
    }
}

/// Build the validation error for an absent required field.
pub fn missing_field(field: &str) -> Error {
    Error::invalid_request(format!("missing required field: {field}")).with_details(json!({
        "field": field,
        "code": "missing_field",
    }))
}

/// Exact-match filters for list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentFilter {
    pub experiment_id: Option<ExperimentId>,
    pub key: Option<ExperimentKey>,
}

impl ExperimentFilter {
    /// Whether a row with the given natural key passes the filter.
    pub fn matches(&self, experiment_id: ExperimentId, key: &ExperimentKey) -> bool {
        self.experiment_id.is_none_or(|wanted| wanted == experiment_id)
            && self.key.as_ref().is_none_or(|wanted| wanted == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    fn key(raw: &str) -> ExperimentKey {
        ExperimentKey::new(raw).expect("valid key")
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    #[case(i64::from(EXPERIMENT_ID_MAX) + 1)]
    fn experiment_id_rejects_out_of_range(#[case] raw: i64) {
        assert!(matches!(
            ExperimentId::new(raw),
            Err(ExperimentValidationError::ExperimentIdOutOfRange { .. })
        ));
    }

    #[rstest]
    fn key_is_trimmed_and_bounded() {
        assert_eq!(key("  cohort ").as_ref(), "cohort");
        assert_eq!(ExperimentKey::new("   "), Err(ExperimentValidationError::EmptyKey));
        let long = "k".repeat(EXPERIMENT_KEY_MAX + 1);
        assert_eq!(
            ExperimentKey::new(long),
            Err(ExperimentValidationError::KeyTooLong {
                max: EXPERIMENT_KEY_MAX
            })
        );
    }

    #[rstest]
    fn value_is_kept_verbatim() {
        let value = ExperimentValue::new(" {\"a\": 1} ").expect("valid value");
        assert_eq!(value.as_ref(), " {\"a\": 1} ");
        assert_eq!(ExperimentValue::new("\n"), Err(ExperimentValidationError::EmptyValue));
    }

    #[rstest]
    fn record_ids_must_be_positive() {
        assert!(ExperimentDataId::new(0).is_err());
        assert_eq!(ExperimentKeyValueId::new(7).expect("valid").get(), 7);
    }

    #[rstest]
    #[case(ExperimentFields::default(), "experiment_id")]
    #[case(ExperimentFields { experiment_id: ExperimentId::new(1).ok(), ..ExperimentFields::default() }, "key")]
    #[case(
        ExperimentFields {
            experiment_id: ExperimentId::new(1).ok(),
            key: Some(key("cohort")),
            value: None,
        },
        "value"
    )]
    fn into_required_reports_first_missing_field(
        #[case] fields: ExperimentFields,
        #[case] expected: &str,
    ) {
        let err = fields.into_required().expect_err("field missing");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        let details = err.details().expect("details");
        assert_eq!(details["field"], expected);
        assert_eq!(details["code"], "missing_field");
    }

    #[rstest]
    fn natural_key_needs_both_parts() {
        let mut fields = ExperimentFields {
            key: Some(key("cohort")),
            ..ExperimentFields::default()
        };
        assert!(fields.natural_key().is_none());
        fields.experiment_id = ExperimentId::new(42).ok();
        let (experiment_id, found) = fields.natural_key().expect("both present");
        assert_eq!(experiment_id.get(), 42);
        assert_eq!(found.as_ref(), "cohort");
    }

    #[rstest]
    fn filter_matches_exact_values() {
        let experiment = ExperimentId::new(42).expect("valid");
        let other = ExperimentId::new(7).expect("valid");
        let filter = ExperimentFilter {
            experiment_id: Some(experiment),
            key: None,
        };
        assert!(filter.matches(experiment, &key("cohort")));
        assert!(!filter.matches(other, &key("cohort")));
        assert!(ExperimentFilter::default().matches(other, &key("anything")));
    }
}
