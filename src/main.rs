use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tollgate::backend::BackendClient;
use tollgate::config::Config;
use tollgate::routes;
use tollgate::state::AppState;
use tollgate::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::load();

    info!(backend_url = %config.backend_url, "starting tollgate");

    let store = Store::open(config.store_path(), config.pool_size).context("failed to open store")?;

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .context("failed to build http client")?;
    let backend = BackendClient::new(config.backend_url.clone(), config.backend_max_concurrent, http_client);

    let config = Arc::new(config);
    let state = AppState::new(store, backend, config.clone());

    // Low-frequency background pruner for the window-counter map (spec
    // §4.3): walks idle users and drops empty sequences to bound memory.
    let pruner_rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            pruner_rate_limiter.prune_idle();
        }
    });

    let app = routes::build(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await.context("failed to bind listener")?;
    info!(%addr, "tollgate listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tollgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
