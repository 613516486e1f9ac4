//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every handler in the inbound HTTP layer, the error
//! envelope schemas, and the two authentication schemes: the session cookie
//! issued by `POST /api/v1/login` and HS256 bearer tokens.

use crate::inbound::http::experiment_data::{ExperimentDataBody, ExperimentDataResponse};
use crate::inbound::http::experiment_key_values::{
    ExperimentKeyValueBody, ExperimentKeyValueResponse,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use crate::inbound::http::users::LoginRequest;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the supported security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/v1/login.",
            ))),
        );
        components.add_security_scheme(
            "BearerToken",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("HS256 access token whose subject is the user id."))
                    .build(),
            ),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Experiments API",
        description = "Per-user experiment data and global experiment key-values."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = []), ("BearerToken" = [])),
    paths(
        crate::inbound::http::users::login,
        crate::inbound::http::experiment_data::list_experiment_data,
        crate::inbound::http::experiment_data::create_experiment_data,
        crate::inbound::http::experiment_data::upsert_experiment_data,
        crate::inbound::http::experiment_data::bulk_upsert_experiment_data,
        crate::inbound::http::experiment_data::get_experiment_data,
        crate::inbound::http::experiment_data::update_experiment_data,
        crate::inbound::http::experiment_data::patch_experiment_data,
        crate::inbound::http::experiment_data::delete_experiment_data,
        crate::inbound::http::experiment_key_values::list_key_values,
        crate::inbound::http::experiment_key_values::create_key_value,
        crate::inbound::http::experiment_key_values::get_key_value,
        crate::inbound::http::experiment_key_values::update_key_value,
        crate::inbound::http::experiment_key_values::patch_key_value,
        crate::inbound::http::experiment_key_values::delete_key_value,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        LoginRequest,
        ExperimentDataBody,
        ExperimentDataResponse,
        ExperimentKeyValueBody,
        ExperimentKeyValueResponse
    )),
    tags(
        (name = "users", description = "Session login"),
        (name = "experiments", description = "Experiment data and key-values"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
