use std::sync::Arc;

use anyhow::{Context, Result};
use campus_api::{router, AppState};
use campus_core::config::CampusConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = CampusConfig::load(None).context("failed to load configuration")?;
    let state = AppState::from_config(&config).await?;
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
