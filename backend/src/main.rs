//! Experiments server entry-point: loads settings, prepares storage, and
//! serves the REST API.

use actix_web::web;
#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetricsBuilder;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use experiments::inbound::http::health::HealthState;
use experiments::outbound::persistence::{DbPool, migrate};
use experiments::settings::{BuildMode, ServerSettings};

mod server;

use server::{ServerConfig, create_server};

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load().map_err(|err| eyre!("loading settings: {err}"))?;
    let session = settings
        .session(BuildMode::from_debug_assertions())
        .wrap_err("validating session settings")?;
    let bind_addr = settings.bind_addr().wrap_err("parsing bind address")?;

    let mut config =
        ServerConfig::new(session, bind_addr).with_access_tokens(settings.access_tokens());

    if let Some(pool_config) = settings.pool_config() {
        if settings.run_migrations {
            let applied = migrate(pool_config.database_url().to_owned())
                .await
                .wrap_err("running database migrations")?;
            info!(applied = applied.len(), "database schema ready");
        }
        let pool = DbPool::new(pool_config)
            .await
            .wrap_err("building database pool")?;
        config = config.with_db_pool(pool);
    }

    #[cfg(feature = "metrics")]
    {
        let prometheus = PrometheusMetricsBuilder::new("experiments")
            .endpoint("/metrics")
            .build()
            .map_err(|err| eyre!("configuring Prometheus metrics: {err}"))?;
        config = config.with_metrics(Some(prometheus));
    }

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config).wrap_err("starting HTTP server")?;
    info!(%bind_addr, "experiments server listening");
    server.await.wrap_err("serving HTTP")
}
