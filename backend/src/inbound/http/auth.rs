//! Principal extraction used by HTTP handlers.
//!
//! A bearer token in the `Authorization` header wins over the session
//! cookie. Other authorization schemes are ignored so browser clients with
//! stray headers still fall back to their session.

use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;

use crate::domain::{BearerToken, Error, User};

use super::ApiResult;
use super::session::SessionContext;
use super::state::HttpState;

/// The authenticated caller. Extraction fails with `401` when the request
/// carries no usable credentials.
#[derive(Debug, Clone)]
pub struct Principal(User);

impl Principal {
    /// Authenticated user.
    pub fn user(&self) -> &User {
        &self.0
    }

    /// Consume the extractor and return the user.
    pub fn into_inner(self) -> User {
        self.0
    }
}

fn bearer_token(req: &HttpRequest) -> Option<BearerToken> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()
        .and_then(BearerToken::from_header_value)
}

async fn authenticate(req: HttpRequest) -> ApiResult<Option<User>> {
    let state = req
        .app_data::<web::Data<HttpState>>()
        .cloned()
        .ok_or_else(|| Error::internal("HTTP state is not registered"))?;

    if let Some(token) = bearer_token(&req) {
        return state.principals.from_bearer(&token).await.map(Some);
    }

    let session = SessionContext::extract(&req).await.map_err(Error::from)?;
    match session.user_id()? {
        Some(user_id) => state.principals.from_session(&user_id).await.map(Some),
        None => Ok(None),
    }
}

impl FromRequest for Principal {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            authenticate(req)
                .await?
                .map(Principal)
                .ok_or_else(|| Error::unauthorized("authentication required"))
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test};
    use rstest::rstest;

    use super::*;
    use crate::domain::UserId;
    use crate::domain::ports::UserRepository;
    use crate::inbound::http::test_utils::{
        TestBackend, session_cookie, test_session_middleware, user,
    };

    fn app(
        state: HttpState,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(state))
            .wrap(test_session_middleware())
            .route(
                "/sign-in/{id}",
                web::post().to(
                    |session: SessionContext, path: web::Path<String>| async move {
                        let id = UserId::new(path.into_inner())
                            .map_err(|err| Error::invalid_request(err.to_string()))?;
                        session.persist_user(&id)?;
                        Ok::<_, Error>(HttpResponse::Ok())
                    },
                ),
            )
            .route(
                "/me",
                web::get().to(|principal: Principal| async move {
                    HttpResponse::Ok().body(principal.user().username().to_string())
                }),
            )
    }

    fn sign_in(id: &UserId) -> test::TestRequest {
        test::TestRequest::post().uri(&format!("/sign-in/{id}"))
    }

    #[actix_web::test]
    async fn anonymous_request_is_unauthorised() {
        let backend = TestBackend::with_users(&[]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn session_cookie_identifies_user() {
        let alice = user("alice", false);
        let backend = TestBackend::with_users(&[&alice]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let signed_in = test::call_service(&app, sign_in(alice.id()).to_request()).await;
        let cookie = session_cookie(&signed_in);

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/me").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "alice");
    }

    #[actix_web::test]
    async fn bearer_token_wins_over_session() {
        let alice = user("alice", false);
        let bob = user("bob", false);
        let backend = TestBackend::with_users(&[&alice, &bob]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let signed_in = test::call_service(&app, sign_in(alice.id()).to_request()).await;
        let cookie = session_cookie(&signed_in);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/me")
                .cookie(cookie)
                .insert_header(backend.bearer(&bob))
                .to_request(),
        )
        .await;
        assert_eq!(test::read_body(res).await, "bob");
    }

    #[rstest]
    #[case("Bearer not-a-jwt")]
    #[case("Bearer a.b.c")]
    #[actix_web::test]
    async fn invalid_bearer_token_is_unauthorised(#[case] header_value: &str) {
        let backend = TestBackend::with_users(&[]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/me")
                .insert_header((header::AUTHORIZATION, header_value))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn other_schemes_fall_back_to_session() {
        let alice = user("alice", false);
        let backend = TestBackend::with_users(&[&alice]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let signed_in = test::call_service(&app, sign_in(alice.id()).to_request()).await;
        let cookie = session_cookie(&signed_in);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/me")
                .cookie(cookie)
                .insert_header((header::AUTHORIZATION, "Basic YWxpY2U6cHc="))
                .to_request(),
        )
        .await;
        assert_eq!(test::read_body(res).await, "alice");
    }

    #[actix_web::test]
    async fn inactive_account_is_rejected_on_bearer_only() {
        let inactive = user("carol", false).with_active(false);
        let backend = TestBackend::with_users(&[&inactive]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let bearer = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/me")
                .insert_header(backend.bearer(&inactive))
                .to_request(),
        )
        .await;
        assert_eq!(bearer.status(), StatusCode::UNAUTHORIZED);

        let signed_in = test::call_service(&app, sign_in(inactive.id()).to_request()).await;
        let cookie = session_cookie(&signed_in);
        let session = test::call_service(
            &app,
            test::TestRequest::get().uri("/me").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(session.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn session_for_removed_account_is_unauthorised() {
        let backend = TestBackend::with_users(&[]).await;
        let app = test::init_service(app(backend.state.clone())).await;

        let signed_in = test::call_service(&app, sign_in(&UserId::random()).to_request()).await;
        let cookie = session_cookie(&signed_in);

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/me").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn bearer_for_known_account_resolves_from_store() {
        let dave = user("dave", true);
        let backend = TestBackend::with_users(&[&dave]).await;
        let renamed = crate::domain::User::new(
            dave.id().clone(),
            crate::domain::Username::new("david").expect("valid"),
        );
        UserRepository::upsert(backend.store.as_ref(), &renamed)
            .await
            .expect("rename");
        let app = test::init_service(app(backend.state.clone())).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/me")
                .insert_header(backend.bearer(&dave))
                .to_request(),
        )
        .await;
        assert_eq!(test::read_body(res).await, "david");
    }
}
