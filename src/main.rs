use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sky_takeout::config::Config;
use sky_takeout::entities::{primary_setup, setup_schema};
use sky_takeout::services::payment::SimulatedGateway;
use sky_takeout::{app, connect, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "server stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let db = connect(&config.database_url).await?;
    setup_schema(&db).await?;
    if let Some(password) = &config.seed_password {
        primary_setup(&db, password).await?;
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(db, config, Arc::new(SimulatedGateway::new()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
