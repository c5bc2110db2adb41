use std::sync::Arc;

use prestige_ranking::{
    api::{create_router, AppState},
    config::{Config, StoreBackend},
    services::{
        store::{HttpRatingStore, InMemoryRatingStore, RatingStore, RetryPolicy},
        ComparisonDispatcher, RatingEngine, SessionManager,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prestige_ranking=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn RatingStore> = match config.store_backend {
        StoreBackend::Http => Arc::new(HttpRatingStore::new(
            config.rating_api_url.clone(),
            config.rating_api_token.clone(),
            config.request_timeout(),
            RetryPolicy::new(config.max_retries, config.retry_base_delay()),
        )?),
        StoreBackend::Memory => Arc::new(InMemoryRatingStore::new()),
    };

    tracing::info!(
        store = store.name(),
        rating_api_url = %config.rating_api_url,
        "Rating store configured"
    );

    let (dispatcher, dispatcher_handle) =
        ComparisonDispatcher::spawn(store.clone(), config.comparison_submit_timeout());
    let engine = RatingEngine::new(store, dispatcher);

    let sessions = Arc::new(SessionManager::new(engine, config.session_ttl()));
    let sweeper = sessions.spawn_sweeper(config.session_sweep_interval());

    let app = create_router(AppState::new(sessions));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    dispatcher_handle.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
