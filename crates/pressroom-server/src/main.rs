mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pressroom_ai::{IndexingClient, OpenAiClient, ProviderChain, SearchClient, TextGenerator};
use pressroom_core::AppConfig;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(pressroom_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = pressroom_db::PoolConfig::from_app_config(&config);
    let pool = pressroom_db::connect_pool(&config.database_url, pool_config).await?;
    pressroom_db::run_migrations(&pool).await?;

    let sites = Arc::new(pressroom_core::load_sites(&config.sites_path)?);
    tracing::info!(sites = sites.sites.len(), "loaded site configuration");

    let generator = Arc::new(build_generator(&config)?);
    let search = match &config.search_api_key {
        Some(key) => Some(Arc::new(SearchClient::new(
            Some(key.clone()),
            config.ai_request_timeout_secs,
        )?)),
        None => None,
    };
    let indexer = match &config.indexing_endpoint {
        Some(endpoint) => Some(Arc::new(IndexingClient::new(
            endpoint,
            config.ai_request_timeout_secs,
        )?)),
        None => None,
    };

    let _scheduler = scheduler::build_scheduler(
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&sites),
        Arc::clone(&generator),
    )
    .await?;

    let app = build_app(AppState {
        pool,
        config: Arc::clone(&config),
        sites,
        generator,
        search,
        indexer,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Assembles the provider chain: the primary model first, then the
/// optional fallback endpoint when one is configured.
fn build_generator(config: &AppConfig) -> anyhow::Result<ProviderChain> {
    let mut providers: Vec<Box<dyn TextGenerator>> = vec![Box::new(OpenAiClient::with_base_url(
        config.ai_api_key.clone(),
        &config.ai_model,
        config.ai_request_timeout_secs,
        &config.ai_base_url,
    )?)];

    if let (Some(base_url), Some(model)) = (&config.ai_fallback_base_url, &config.ai_fallback_model)
    {
        providers.push(Box::new(OpenAiClient::with_base_url(
            config.ai_api_key.clone(),
            model,
            config.ai_request_timeout_secs,
            base_url,
        )?));
    }

    Ok(ProviderChain::with_retry(
        providers,
        config.ai_max_retries,
        config.ai_retry_backoff_base_ms,
    ))
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
