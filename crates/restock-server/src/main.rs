mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use restock_enrich::EnrichmentClient;
use restock_pipeline::{BudgetManager, PipelineConfig, SystemClock};
use restock_storefront::StorefrontClient;

use crate::api::{build_app, AppState, JobRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(restock_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = restock_db::PoolConfig::from_app_config(&config);
    let pool = restock_db::connect_pool(&config.database_url, pool_config).await?;
    restock_db::run_migrations(&pool).await?;

    let pricing = match restock_core::load_competitors(&config.competitors_path) {
        Ok(file) => restock_core::PricingConfig {
            competitors: file.competitors,
            ..restock_core::PricingConfig::default()
        },
        Err(restock_core::ConfigError::CompetitorsFileIo { path, .. }) => {
            tracing::warn!(path, "competitors.yaml not readable — using built-in bands");
            restock_core::PricingConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    let pipeline = Arc::new(PipelineConfig {
        sub_batch_size: config.sub_batch_size,
        inter_batch_delay_ms: config.inter_batch_delay_ms,
        pricing,
    });

    let budget = Arc::new(BudgetManager::new(
        config.budget_daily_limit,
        config.budget_cost_per_identifier,
        Arc::new(SystemClock),
    ));

    let enricher = Arc::new(EnrichmentClient::with_base_url(
        config.enrich_api_key.as_deref().unwrap_or_default(),
        config.enrich_timeout_secs,
        config.enrich_max_retries,
        config.enrich_backoff_base_ms,
        &config.enrich_base_url,
    )?);

    let pusher = match (&config.storefront_base_url, &config.storefront_token) {
        (Some(base_url), Some(token)) => Some(Arc::new(StorefrontClient::new(
            base_url,
            token,
            config.storefront_timeout_secs,
            config.storefront_max_retries,
            config.storefront_backoff_base_ms,
        )?)),
        _ => {
            tracing::info!("storefront push disabled — no base URL/token configured");
            None
        }
    };

    let state = AppState {
        pool,
        budget,
        pipeline,
        fuzzy_threshold: config.fuzzy_threshold,
        enricher,
        pusher,
        registry: JobRegistry::default(),
    };
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "restock server listening");
    axum::serve(listener, app)
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
