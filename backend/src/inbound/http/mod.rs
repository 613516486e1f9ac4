//! HTTP inbound adapter exposing REST endpoints.

pub mod auth;
pub mod error;
pub mod experiment_data;
pub mod experiment_key_values;
pub mod health;
pub mod schemas;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod users;
pub mod validation;

use actix_web::web;

pub use error::ApiResult;

/// JSON extractor configuration mapping malformed bodies onto the error
/// envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| validation::invalid_json_error(err).into())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, post, test};
    use serde_json::Value;

    use super::*;

    #[post("/echo")]
    async fn echo(payload: web::Json<Value>) -> HttpResponse {
        HttpResponse::Ok().json(payload.into_inner())
    }

    #[actix_web::test]
    async fn malformed_json_uses_error_envelope() {
        let app = test::init_service(App::new().app_data(json_config()).service(echo)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/echo")
                .insert_header(("content-type", "application/json"))
                .set_payload("{not json")
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["code"], "invalid_request");
        assert_eq!(body["details"]["code"], "invalid_json");
    }
}
