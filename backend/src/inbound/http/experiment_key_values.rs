//! Experiment key-value API handlers.
//!
//! ```text
//! GET    /api/v1/experiments/key-value?experiment_id=42
//! POST   /api/v1/experiments/key-value       {"experiment_id":42,"key":"rollout","value":"50"}
//! GET    /api/v1/experiments/key-value/{id}
//! PUT    /api/v1/experiments/key-value/{id}
//! PATCH  /api/v1/experiments/key-value/{id}
//! DELETE /api/v1/experiments/key-value/{id}
//! ```
//!
//! Reads are anonymous. Writes need a staff principal.

use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Error, ExperimentFields, ExperimentKeyValue, ExperimentKeyValueId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Principal;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{ExperimentFilterQuery, parse_fields};

/// Write body for experiment key-values.
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ExperimentKeyValueBody {
    #[schema(value_type = Option<i32>, example = 42)]
    pub experiment_id: Option<Value>,
    #[schema(example = "rollout")]
    pub key: Option<String>,
    /// Stored verbatim; a JSON number is kept as its text.
    #[schema(value_type = Option<String>, example = "50")]
    pub value: Option<Value>,
}

impl ExperimentKeyValueBody {
    fn into_fields(self) -> Result<ExperimentFields, Error> {
        parse_fields(self.experiment_id, self.key, self.value)
    }
}

/// Experiment key-value as returned to clients.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ExperimentKeyValueResponse {
    #[schema(example = 3)]
    pub id: i64,
    #[schema(example = 42)]
    pub experiment_id: i32,
    #[schema(example = "rollout")]
    pub key: String,
    #[schema(example = "50")]
    pub value: String,
    pub created: String,
    pub modified: String,
}

impl From<ExperimentKeyValue> for ExperimentKeyValueResponse {
    fn from(value: ExperimentKeyValue) -> Self {
        Self {
            id: value.id.get(),
            experiment_id: value.experiment_id.get(),
            key: value.key.into(),
            value: value.value.into(),
            created: value.created_at.to_rfc3339(),
            modified: value.modified_at.to_rfc3339(),
        }
    }
}

fn record_id(raw: &str) -> Result<ExperimentKeyValueId, Error> {
    raw.parse::<i64>()
        .ok()
        .and_then(|id| ExperimentKeyValueId::new(id).ok())
        .ok_or_else(|| Error::not_found(format!("experiment key-value {raw} not found")))
}

/// List key-values, optionally filtered.
#[utoipa::path(
    get,
    path = "/api/v1/experiments/key-value",
    params(
        ("experiment_id" = Option<i32>, Query, description = "Only rows for this experiment"),
        ("key" = Option<String>, Query, description = "Only rows with this key")
    ),
    responses(
        (status = 200, description = "Rows ordered by id", body = [ExperimentKeyValueResponse]),
        (status = 400, description = "Invalid filter", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "listExperimentKeyValues",
    security([])
)]
#[get("/experiments/key-value")]
pub async fn list_key_values(
    state: web::Data<HttpState>,
    query: web::Query<ExperimentFilterQuery>,
) -> ApiResult<web::Json<Vec<ExperimentKeyValueResponse>>> {
    let filter = query.into_inner().into_filter()?;
    let rows = state.key_values_query.list(&filter).await?;
    Ok(web::Json(
        rows.into_iter()
            .map(ExperimentKeyValueResponse::from)
            .collect(),
    ))
}

/// Create a key-value. Staff only.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/key-value",
    request_body = ExperimentKeyValueBody,
    responses(
        (status = 201, description = "Row created", body = ExperimentKeyValueResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Staff only", body = ErrorSchema),
        (status = 409, description = "Row already exists", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "createExperimentKeyValue"
)]
#[post("/experiments/key-value")]
pub async fn create_key_value(
    state: web::Data<HttpState>,
    principal: Principal,
    payload: web::Json<ExperimentKeyValueBody>,
) -> ApiResult<HttpResponse> {
    let fields = payload.into_inner().into_fields()?;
    let record = state.key_values.create(principal.user(), fields).await?;
    Ok(HttpResponse::Created().json(ExperimentKeyValueResponse::from(record)))
}

/// Fetch a key-value.
#[utoipa::path(
    get,
    path = "/api/v1/experiments/key-value/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    responses(
        (status = 200, description = "Row", body = ExperimentKeyValueResponse),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "getExperimentKeyValue",
    security([])
)]
#[get("/experiments/key-value/{id}")]
pub async fn get_key_value(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<ExperimentKeyValueResponse>> {
    let id = record_id(&path.into_inner())?;
    let record = state.key_values_query.get(id).await?;
    Ok(web::Json(record.into()))
}

/// Replace every field of a key-value. Staff only.
#[utoipa::path(
    put,
    path = "/api/v1/experiments/key-value/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    request_body = ExperimentKeyValueBody,
    responses(
        (status = 200, description = "Row updated", body = ExperimentKeyValueResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Staff only", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Collides with another row", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "updateExperimentKeyValue"
)]
#[put("/experiments/key-value/{id}")]
pub async fn update_key_value(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
    payload: web::Json<ExperimentKeyValueBody>,
) -> ApiResult<web::Json<ExperimentKeyValueResponse>> {
    let id = record_id(&path.into_inner())?;
    let fields = payload.into_inner().into_fields()?;
    let record = state
        .key_values
        .update(principal.user(), id, fields)
        .await?;
    Ok(web::Json(record.into()))
}

/// Apply the present fields to a key-value. Staff only.
#[utoipa::path(
    patch,
    path = "/api/v1/experiments/key-value/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    request_body = ExperimentKeyValueBody,
    responses(
        (status = 200, description = "Row updated", body = ExperimentKeyValueResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Staff only", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Collides with another row", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "patchExperimentKeyValue"
)]
#[patch("/experiments/key-value/{id}")]
pub async fn patch_key_value(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
    payload: web::Json<ExperimentKeyValueBody>,
) -> ApiResult<web::Json<ExperimentKeyValueResponse>> {
    let id = record_id(&path.into_inner())?;
    let fields = payload.into_inner().into_fields()?;
    let record = state
        .key_values
        .partial_update(principal.user(), id, fields)
        .await?;
    Ok(web::Json(record.into()))
}

/// Delete a key-value. Staff only.
#[utoipa::path(
    delete,
    path = "/api/v1/experiments/key-value/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    responses(
        (status = 204, description = "Row deleted"),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Staff only", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "deleteExperimentKeyValue"
)]
#[delete("/experiments/key-value/{id}")]
pub async fn delete_key_value(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = record_id(&path.into_inner())?;
    state.key_values.delete(principal.user(), id).await?;
    Ok(HttpResponse::NoContent().finish())
}
