//! Experiment data API handlers.
//!
//! ```text
//! GET    /api/v1/experiments/data?experiment_id=42&key=cohort
//! POST   /api/v1/experiments/data       {"experiment_id":42,"key":"cohort","value":"A"}
//! PUT    /api/v1/experiments/data       {"experiment_id":42,"key":"cohort","value":"B"}
//! POST   /api/v1/experiments/data/bulk  [{"experiment_id":42,"key":"cohort","value":"A","user":"alice"}]
//! GET    /api/v1/experiments/data/{id}
//! PUT    /api/v1/experiments/data/{id}
//! PATCH  /api/v1/experiments/data/{id}
//! DELETE /api/v1/experiments/data/{id}
//! ```
//!
//! Every route needs a principal and only ever sees the principal's rows.
//! Staff may name another owner with `user` on create and create-or-update.

use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ports::{
    BulkUpsertItem, CreateExperimentDataRequest, UpsertExperimentDataRequest,
};
use crate::domain::{Error, ExperimentData, ExperimentDataId, ExperimentFields, Username, WriteOutcome};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Principal;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{ExperimentFilterQuery, parse_fields, parse_username};

/// Write body for experiment data.
///
/// Every field is optional on the wire; which ones are required depends on
/// the operation.
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ExperimentDataBody {
    /// Experiment number, as an integer or numeric string.
    #[schema(value_type = Option<i32>, example = 42)]
    pub experiment_id: Option<Value>,
    #[schema(example = "cohort")]
    pub key: Option<String>,
    /// Stored verbatim; a JSON number is kept as its text.
    #[schema(value_type = Option<String>, example = "A")]
    pub value: Option<Value>,
    /// Owner's username. Only staff may name someone other than themselves.
    #[schema(example = "alice")]
    pub user: Option<String>,
}

impl ExperimentDataBody {
    fn into_parts(self) -> Result<(Option<Username>, ExperimentFields), Error> {
        let Self {
            experiment_id,
            key,
            value,
            user,
        } = self;
        let fields = parse_fields(experiment_id, key, value)?;
        Ok((parse_username(user)?, fields))
    }
}

/// Experiment data as returned to clients.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ExperimentDataResponse {
    #[schema(example = 17)]
    pub id: i64,
    /// Owner's username.
    #[schema(example = "alice")]
    pub user: String,
    /// Owner's identifier.
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub user_id: String,
    #[schema(example = 42)]
    pub experiment_id: i32,
    #[schema(example = "cohort")]
    pub key: String,
    #[schema(example = "A")]
    pub value: String,
    /// RFC 3339 creation time.
    pub created: String,
    /// RFC 3339 time of the last write.
    pub modified: String,
}

impl From<ExperimentData> for ExperimentDataResponse {
    fn from(value: ExperimentData) -> Self {
        Self {
            id: value.id.get(),
            user: value.owner_username.into(),
            user_id: value.owner.into(),
            experiment_id: value.experiment_id.get(),
            key: value.key.into(),
            value: value.value.into(),
            created: value.created_at.to_rfc3339(),
            modified: value.modified_at.to_rfc3339(),
        }
    }
}

fn record_id(raw: &str) -> Result<ExperimentDataId, Error> {
    raw.parse::<i64>()
        .ok()
        .and_then(|id| ExperimentDataId::new(id).ok())
        .ok_or_else(|| Error::not_found(format!("experiment data {raw} not found")))
}

fn write_response(outcome: WriteOutcome) -> HttpResponse {
    let mut builder = if outcome.created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    builder.json(ExperimentDataResponse::from(outcome.record))
}

/// List the caller's experiment data.
#[utoipa::path(
    get,
    path = "/api/v1/experiments/data",
    params(
        ("experiment_id" = Option<i32>, Query, description = "Only rows for this experiment"),
        ("key" = Option<String>, Query, description = "Only rows with this key")
    ),
    responses(
        (status = 200, description = "Caller's rows ordered by id", body = [ExperimentDataResponse]),
        (status = 400, description = "Invalid filter", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "listExperimentData"
)]
#[get("/experiments/data")]
pub async fn list_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    query: web::Query<ExperimentFilterQuery>,
) -> ApiResult<web::Json<Vec<ExperimentDataResponse>>> {
    let filter = query.into_inner().into_filter()?;
    let rows = state
        .experiment_data_query
        .list(principal.user(), &filter)
        .await?;
    Ok(web::Json(
        rows.into_iter().map(ExperimentDataResponse::from).collect(),
    ))
}

/// Create a row. Fails with `409` when the row already exists.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/data",
    request_body = ExperimentDataBody,
    responses(
        (status = 201, description = "Row created", body = ExperimentDataResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Writing for another user requires staff", body = ErrorSchema),
        (status = 404, description = "Named user not found", body = ErrorSchema),
        (status = 409, description = "Row already exists", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "createExperimentData"
)]
#[post("/experiments/data")]
pub async fn create_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    payload: web::Json<ExperimentDataBody>,
) -> ApiResult<HttpResponse> {
    let (on_behalf_of, fields) = payload.into_inner().into_parts()?;
    let record = state
        .experiment_data
        .create(CreateExperimentDataRequest {
            actor: principal.into_inner(),
            on_behalf_of,
            fields,
        })
        .await?;
    Ok(HttpResponse::Created().json(ExperimentDataResponse::from(record)))
}

/// Update the row matching `(user, experiment_id, key)` or create it.
#[utoipa::path(
    put,
    path = "/api/v1/experiments/data",
    request_body = ExperimentDataBody,
    responses(
        (status = 200, description = "Existing row updated", body = ExperimentDataResponse),
        (status = 201, description = "Row created", body = ExperimentDataResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Writing for another user requires staff", body = ErrorSchema),
        (status = 404, description = "Named user not found", body = ErrorSchema),
        (status = 409, description = "Concurrent write could not be applied", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "upsertExperimentData"
)]
#[put("/experiments/data")]
pub async fn upsert_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    payload: web::Json<ExperimentDataBody>,
) -> ApiResult<HttpResponse> {
    let (on_behalf_of, fields) = payload.into_inner().into_parts()?;
    let outcome = state
        .experiment_data
        .create_or_update(UpsertExperimentDataRequest {
            actor: principal.into_inner(),
            record_id: None,
            on_behalf_of,
            fields,
        })
        .await?;
    Ok(write_response(outcome))
}

/// Create-or-update a batch in order. Staff only; stops at the first failure.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/data/bulk",
    request_body = [ExperimentDataBody],
    responses(
        (status = 200, description = "Rows written, in request order", body = [ExperimentDataResponse]),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Staff only", body = ErrorSchema),
        (status = 404, description = "Named user not found", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "bulkUpsertExperimentData"
)]
#[post("/experiments/data/bulk")]
pub async fn bulk_upsert_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    payload: web::Json<Vec<ExperimentDataBody>>,
) -> ApiResult<web::Json<Vec<ExperimentDataResponse>>> {
    let items = payload
        .into_inner()
        .into_iter()
        .map(|body| {
            body.into_parts()
                .map(|(on_behalf_of, fields)| BulkUpsertItem {
                    on_behalf_of,
                    fields,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let outcomes = state
        .experiment_data
        .bulk_upsert(principal.user(), items)
        .await?;
    Ok(web::Json(
        outcomes
            .into_iter()
            .map(|outcome| ExperimentDataResponse::from(outcome.record))
            .collect(),
    ))
}

/// Fetch one of the caller's rows.
#[utoipa::path(
    get,
    path = "/api/v1/experiments/data/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    responses(
        (status = 200, description = "Row", body = ExperimentDataResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "getExperimentData"
)]
#[get("/experiments/data/{id}")]
pub async fn get_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
) -> ApiResult<web::Json<ExperimentDataResponse>> {
    let id = record_id(&path.into_inner())?;
    let record = state
        .experiment_data_query
        .get(principal.user(), id)
        .await?;
    Ok(web::Json(record.into()))
}

/// Update the addressed row with the full payload.
#[utoipa::path(
    put,
    path = "/api/v1/experiments/data/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    request_body = ExperimentDataBody,
    responses(
        (status = 200, description = "Row updated", body = ExperimentDataResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Writing for another user requires staff", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Collides with another row", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "updateExperimentData"
)]
#[put("/experiments/data/{id}")]
pub async fn update_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
    payload: web::Json<ExperimentDataBody>,
) -> ApiResult<HttpResponse> {
    let id = record_id(&path.into_inner())?;
    let (on_behalf_of, fields) = payload.into_inner().into_parts()?;
    let outcome = state
        .experiment_data
        .create_or_update(UpsertExperimentDataRequest {
            actor: principal.into_inner(),
            record_id: Some(id),
            on_behalf_of,
            fields,
        })
        .await?;
    Ok(write_response(outcome))
}

/// Apply the present fields to one of the caller's rows. `user` is ignored.
#[utoipa::path(
    patch,
    path = "/api/v1/experiments/data/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    request_body = ExperimentDataBody,
    responses(
        (status = 200, description = "Row updated", body = ExperimentDataResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Collides with another row", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "patchExperimentData"
)]
#[patch("/experiments/data/{id}")]
pub async fn patch_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
    payload: web::Json<ExperimentDataBody>,
) -> ApiResult<web::Json<ExperimentDataResponse>> {
    let id = record_id(&path.into_inner())?;
    let (_, fields) = payload.into_inner().into_parts()?;
    let record = state
        .experiment_data
        .partial_update(principal.user(), id, fields)
        .await?;
    Ok(web::Json(record.into()))
}

/// Delete one of the caller's rows.
#[utoipa::path(
    delete,
    path = "/api/v1/experiments/data/{id}",
    params(("id" = i64, Path, description = "Row identifier")),
    responses(
        (status = 204, description = "Row deleted"),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["experiments"],
    operation_id = "deleteExperimentData"
)]
#[delete("/experiments/data/{id}")]
pub async fn delete_experiment_data(
    state: web::Data<HttpState>,
    principal: Principal,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = record_id(&path.into_inner())?;
    state.experiment_data.delete(principal.user(), id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
#[path = "experiment_data_tests.rs"]
mod tests;
