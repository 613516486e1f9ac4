//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    AccessTokenVerifier, ExperimentDataCommand, ExperimentDataQuery, ExperimentDataRepository,
    ExperimentKeyValueCommand, ExperimentKeyValueQuery, ExperimentKeyValueRepository,
    FixtureLoginService, LoginService, PrincipalResolver, UserRepository,
};
use crate::domain::{ExperimentDataService, ExperimentKeyValueService, PrincipalService};

/// Driven adapters the domain services are built over.
#[derive(Clone)]
pub struct HttpStateAdapters {
    pub users: Arc<dyn UserRepository>,
    pub experiment_data: Arc<dyn ExperimentDataRepository>,
    pub key_values: Arc<dyn ExperimentKeyValueRepository>,
    pub access_tokens: Arc<dyn AccessTokenVerifier>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub login: Arc<dyn LoginService>,
    pub principals: Arc<dyn PrincipalResolver>,
    pub experiment_data: Arc<dyn ExperimentDataCommand>,
    pub experiment_data_query: Arc<dyn ExperimentDataQuery>,
    pub key_values: Arc<dyn ExperimentKeyValueCommand>,
    pub key_values_query: Arc<dyn ExperimentKeyValueQuery>,
}

impl HttpState {
    /// Wire the domain services over a set of driven adapters.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use experiments::domain::ports::DisabledAccessTokenVerifier;
    /// use experiments::inbound::http::state::{HttpState, HttpStateAdapters};
    /// use experiments::outbound::memory::InMemoryExperimentStore;
    ///
    /// let store = Arc::new(InMemoryExperimentStore::new());
    /// let state = HttpState::from_adapters(HttpStateAdapters {
    ///     users: store.clone(),
    ///     experiment_data: store.clone(),
    ///     key_values: store,
    ///     access_tokens: Arc::new(DisabledAccessTokenVerifier),
    /// });
    /// let _login = state.login.clone();
    /// ```
    pub fn from_adapters(adapters: HttpStateAdapters) -> Self {
        let HttpStateAdapters {
            users,
            experiment_data,
            key_values,
            access_tokens,
        } = adapters;

        let data_service = Arc::new(ExperimentDataService::new(
            experiment_data,
            Arc::clone(&users),
        ));
        let key_value_service = Arc::new(ExperimentKeyValueService::new(key_values));

        Self {
            login: Arc::new(FixtureLoginService::new(Arc::clone(&users))),
            principals: Arc::new(PrincipalService::new(users, access_tokens)),
            experiment_data: data_service.clone(),
            experiment_data_query: data_service,
            key_values: key_value_service.clone(),
            key_values_query: key_value_service,
        }
    }
}
