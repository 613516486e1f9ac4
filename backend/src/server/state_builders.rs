//! Builders selecting storage and token adapters for the HTTP state.

use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};

use experiments::domain::ports::{
    AccessTokenVerifier, DisabledAccessTokenVerifier, ExperimentDataRepository,
    ExperimentKeyValueRepository, UserRepository,
};
use experiments::inbound::http::state::{HttpState, HttpStateAdapters};
use experiments::outbound::memory::InMemoryExperimentStore;
use experiments::outbound::persistence::{
    DieselExperimentDataRepository, DieselExperimentKeyValueRepository, DieselUserRepository,
};
use experiments::outbound::token::JwtAccessTokenVerifier;
use experiments::settings::AccessTokenSettings;

use super::ServerConfig;

/// Repository adapters backing the driving ports.
#[derive(Clone)]
struct Repositories {
    users: Arc<dyn UserRepository>,
    experiment_data: Arc<dyn ExperimentDataRepository>,
    key_values: Arc<dyn ExperimentKeyValueRepository>,
}

fn in_memory_repositories() -> Repositories {
    let store = Arc::new(InMemoryExperimentStore::new());
    Repositories {
        users: store.clone(),
        experiment_data: store.clone(),
        key_values: store,
    }
}

/// Use database-backed repositories when a pool is available, otherwise a
/// shared in-memory store.
fn select_repositories<Pool>(
    pool: &Option<Pool>,
    make_db_backed: impl FnOnce(&Pool) -> Repositories,
) -> Repositories {
    match pool {
        Some(pool) => make_db_backed(pool),
        None => {
            warn!("no database configured; experiment data is kept in memory");
            in_memory_repositories()
        }
    }
}

fn build_access_tokens(settings: Option<&AccessTokenSettings>) -> Arc<dyn AccessTokenVerifier> {
    match settings {
        Some(settings) => {
            info!(
                issuer = %settings.issuer,
                audience = %settings.audience,
                "bearer authentication enabled"
            );
            Arc::new(JwtAccessTokenVerifier::new(
                settings.secret.clone(),
                settings.issuer.clone(),
                settings.audience.clone(),
            ))
        }
        None => {
            info!("bearer authentication disabled; no signing secret configured");
            Arc::new(DisabledAccessTokenVerifier)
        }
    }
}

/// Wire the HTTP state from the configured adapters.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let repositories = select_repositories(&config.db_pool, |pool| Repositories {
        users: Arc::new(DieselUserRepository::new(pool.clone())),
        experiment_data: Arc::new(DieselExperimentDataRepository::new(pool.clone())),
        key_values: Arc::new(DieselExperimentKeyValueRepository::new(pool.clone())),
    });
    let access_tokens = build_access_tokens(config.access_tokens.as_ref());
    web::Data::new(state_from(repositories, access_tokens))
}

fn state_from(
    repositories: Repositories,
    access_tokens: Arc<dyn AccessTokenVerifier>,
) -> HttpState {
    let Repositories {
        users,
        experiment_data,
        key_values,
    } = repositories;
    HttpState::from_adapters(HttpStateAdapters {
        users,
        experiment_data,
        key_values,
        access_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use experiments::domain::ports::{ExperimentKeyValueCommand, ExperimentKeyValueQuery};
    use experiments::domain::{
        BearerToken, ExperimentFields, ExperimentFilter, ExperimentId, ExperimentKey,
        ExperimentValue, User, UserId, Username,
    };
    use rstest::rstest;

    fn staff() -> User {
        User::new(UserId::random(), Username::new("operator").expect("username")).with_staff(true)
    }

    fn fields() -> ExperimentFields {
        ExperimentFields {
            experiment_id: Some(ExperimentId::new(1).expect("experiment id")),
            key: Some(ExperimentKey::new("rollout").expect("key")),
            value: Some(ExperimentValue::new("50").expect("value")),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn pool_present_selects_db_backed_repositories() {
        let db_store = Arc::new(InMemoryExperimentStore::new());
        let injected = db_store.clone();
        let repositories = select_repositories(&Some(()), move |_| Repositories {
            users: injected.clone(),
            experiment_data: injected.clone(),
            key_values: injected,
        });
        let state = state_from(repositories, Arc::new(DisabledAccessTokenVerifier));

        state
            .key_values
            .create(&staff(), fields())
            .await
            .expect("staff create");

        let fresh = state_from(in_memory_repositories(), Arc::new(DisabledAccessTokenVerifier));
        let filter = ExperimentFilter::default();
        assert_eq!(state.key_values_query.list(&filter).await.expect("list").len(), 1);
        assert!(fresh.key_values_query.list(&filter).await.expect("list").is_empty());
        assert_eq!(
            ExperimentKeyValueRepository::list(db_store.as_ref(), &filter)
                .await
                .expect("store list")
                .len(),
            1
        );
    }

    #[rstest]
    #[tokio::test]
    async fn pool_absent_uses_in_memory_store() {
        let repositories = select_repositories::<()>(&None, |_| unreachable!("no pool"));
        let account = staff();
        repositories.users.upsert(&account).await.expect("seed user");

        let found = repositories
            .users
            .find_by_username(account.username())
            .await
            .expect("lookup");
        assert_eq!(found, Some(account));
    }

    #[rstest]
    fn missing_secret_disables_bearer_tokens() {
        let verifier = build_access_tokens(None);
        let token = BearerToken::from_header_value("Bearer anything").expect("bearer");
        assert!(verifier.verify(&token).is_err());
    }

    #[rstest]
    fn configured_secret_accepts_issued_tokens() {
        let settings = AccessTokenSettings {
            secret: "state-builder-secret".into(),
            issuer: "experiments".into(),
            audience: "experiments-api".into(),
        };
        let verifier = build_access_tokens(Some(&settings));
        let subject = UserId::random();
        let issued = JwtAccessTokenVerifier::new("state-builder-secret", "experiments", "experiments-api")
            .issue_token(&subject, Duration::minutes(1))
            .expect("issue token");
        let token = BearerToken::from_header_value(&format!("Bearer {issued}")).expect("bearer");
        assert_eq!(verifier.verify(&token).expect("valid token"), subject);
    }
}
