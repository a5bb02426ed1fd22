mod api;
mod catalog;
mod middleware;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use nutriprice_db::{PgSupplementStore, SupplementStore};
use nutriprice_scraper::{ExtractorConfig, HttpPriceExtractor, PriceExtractor};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    catalog::{CatalogService, SupplementCache},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(nutriprice_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(config = ?config, "starting nutriprice-server");

    let pool_config = nutriprice_db::PoolConfig::from_app_config(&config);
    let pool = nutriprice_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = nutriprice_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let extractor = HttpPriceExtractor::new(ExtractorConfig::from_app_config(&config))?;
    let catalog = Arc::new(CatalogService::new(
        Arc::new(PgSupplementStore::new(pool)) as Arc<dyn SupplementStore>,
        Arc::new(extractor) as Arc<dyn PriceExtractor>,
        SupplementCache::new(Duration::from_secs(config.cache_ttl_secs)),
    ));

    let _scheduler =
        scheduler::build_scheduler(Arc::clone(&catalog), config.refresh_cron.as_deref()).await?;

    let auth = AuthState::from_config(&config)?;
    let app = build_app(AppState { catalog }, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
