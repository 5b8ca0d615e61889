//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use ferroas2_core::ServerConfig;
use ferroas2_worker::Scheduler;

use crate::state::AppState;

/// Everything `start_server` needs to run.
pub struct App {
    pub state: AppState,
    pub scheduler: Arc<Scheduler>,
    pub file_router: Router,
    pub mdn_router: Router,
}

/// Initialize the entire application
pub async fn initialize_app(config: ServerConfig) -> Result<App> {
    ferroas2_infra::init_telemetry(config.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        home = %config.directories.home.display(),
        "Configuration loaded and validated successfully"
    );

    config
        .directories
        .create_all()
        .context("Failed to create AS2 directories")?;

    let services = services::initialize_services(&config)?;
    let state = AppState::new(services.clone(), routes::MAX_BODY_BYTES);
    let scheduler = services::initialize_scheduler(&config, services).await?;

    Ok(App {
        file_router: routes::file_routes(state.clone()),
        mdn_router: routes::mdn_routes(state.clone()),
        state,
        scheduler,
    })
}
