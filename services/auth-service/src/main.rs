use std::sync::Arc;

use anyhow::Context;
use auth_service::config::{load_auth_config, load_server_config};
use auth_service::directory::PgUserDirectory;
use auth_service::ledger::RedisRefreshLedger;
use auth_service::password::PasswordHasher;
use auth_service::tokens::TokenIssuer;
use auth_service::{build_router, AppState, AuthCore};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let auth_config = load_auth_config()?;
    let server_config = load_server_config()?;

    let db_pool = PgPool::connect(&server_config.database_url)
        .await
        .context("Failed to connect to database")?;
    let directory = PgUserDirectory::new(db_pool, auth_config.store_timeout);
    directory
        .migrate()
        .await
        .context("Failed to prepare users table")?;

    let ledger = RedisRefreshLedger::connect(&server_config.redis_url, auth_config.store_timeout).await?;

    let issuer = TokenIssuer::new(
        auth_config.tokens.clone(),
        &auth_config.access_secret,
        &auth_config.refresh_secret,
    );
    let core = AuthCore::new(
        Arc::new(directory),
        Arc::new(ledger),
        issuer,
        PasswordHasher::new(),
    )
    .await
    .context("Failed to initialise auth core")?;

    let state = AppState::new(Arc::new(core), &auth_config);
    info!(
        public_routes = ?state.gate.public().snapshot(),
        user_routes = ?state.gate.user_tier().snapshot(),
        "role gate configured"
    );
    let app = build_router(state);

    let addr = server_config.addr;
    info!(%addr, "starting auth-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
