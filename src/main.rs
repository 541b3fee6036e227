use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ledger_tenancy::config;
use ledger_tenancy::database::DatabaseManager;
use ledger_tenancy::tenancy::QueryRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SESSION_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting ledger tenancy in {:?} mode", config.environment);

    // A missing or malformed base profile is fatal: fail before accepting traffic
    let router = QueryRouter::global().context("invalid base database configuration")?;
    tracing::info!(
        "Base database '{}' -> {}",
        router.base_alias(),
        router.registry().base_profile()
    );

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, ledger_tenancy::app())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
