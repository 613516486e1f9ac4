//! Request field parsing shared by the experiment handlers.
//!
//! Raw JSON and query-string values are turned into domain value types here,
//! so handlers only ever pass validated data to the driving ports. Failures
//! are `invalid_request` errors with `details.field` and `details.code`.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::{
    Error, ExperimentFields, ExperimentFilter, ExperimentId, ExperimentKey, ExperimentValue,
    Username,
};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidValue,
    InvalidJson,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::InvalidJson => "invalid_json",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(self) -> &'static str {
        self.0
    }
}

pub(crate) const EXPERIMENT_ID: FieldName = FieldName::new("experiment_id");
pub(crate) const KEY: FieldName = FieldName::new("key");
pub(crate) const VALUE: FieldName = FieldName::new("value");
pub(crate) const USER: FieldName = FieldName::new("user");

pub(crate) fn invalid_value_error(field: FieldName, message: impl std::fmt::Display) -> Error {
    let field = field.as_str();
    Error::invalid_request(format!("{field}: {message}")).with_details(json!({
        "field": field,
        "code": ErrorCode::InvalidValue.as_str(),
    }))
}

/// Error returned when a request body is not the JSON the endpoint expects.
pub(crate) fn invalid_json_error(message: impl std::fmt::Display) -> Error {
    Error::invalid_request(format!("malformed request body: {message}")).with_details(json!({
        "code": ErrorCode::InvalidJson.as_str(),
    }))
}

fn integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Parse an experiment id given as a JSON integer or a numeric string.
pub(crate) fn parse_experiment_id(raw: Option<Value>) -> Result<Option<ExperimentId>, Error> {
    let Some(raw) = raw.filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    let number =
        integer(&raw).ok_or_else(|| invalid_value_error(EXPERIMENT_ID, "must be an integer"))?;
    ExperimentId::new(number)
        .map(Some)
        .map_err(|err| invalid_value_error(EXPERIMENT_ID, err))
}

pub(crate) fn parse_key(raw: Option<String>) -> Result<Option<ExperimentKey>, Error> {
    raw.map(|key| ExperimentKey::new(key).map_err(|err| invalid_value_error(KEY, err)))
        .transpose()
}

/// Parse a value given as a JSON string or number. Numbers keep their JSON
/// text, so `5` is stored as `"5"`.
pub(crate) fn parse_value(raw: Option<Value>) -> Result<Option<ExperimentValue>, Error> {
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(_) => return Err(invalid_value_error(VALUE, "must be a string or number")),
    };
    ExperimentValue::new(text)
        .map(Some)
        .map_err(|err| invalid_value_error(VALUE, err))
}

pub(crate) fn parse_username(raw: Option<String>) -> Result<Option<Username>, Error> {
    raw.map(|name| Username::new(name).map_err(|err| invalid_value_error(USER, err)))
        .transpose()
}

/// Parse the writable fields of a body. Absent fields stay `None`.
pub(crate) fn parse_fields(
    experiment_id: Option<Value>,
    key: Option<String>,
    value: Option<Value>,
) -> Result<ExperimentFields, Error> {
    Ok(ExperimentFields {
        experiment_id: parse_experiment_id(experiment_id)?,
        key: parse_key(key)?,
        value: parse_value(value)?,
    })
}

/// Query string accepted by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentFilterQuery {
    pub experiment_id: Option<String>,
    pub key: Option<String>,
}

impl ExperimentFilterQuery {
    pub(crate) fn into_filter(self) -> Result<ExperimentFilter, Error> {
        parse_filter(self.experiment_id, self.key)
    }
}

/// Parse list filters. Blank query values are ignored.
pub(crate) fn parse_filter(
    experiment_id: Option<String>,
    key: Option<String>,
) -> Result<ExperimentFilter, Error> {
    let present = |raw: Option<String>| raw.filter(|text| !text.trim().is_empty());
    Ok(ExperimentFilter {
        experiment_id: parse_experiment_id(present(experiment_id).map(Value::String))?,
        key: parse_key(present(key))?,
    })
}
