//! Service initialization

use std::sync::Arc;

use anyhow::{Context, Result};
use ferroas2_core::models::WatchedDir;
use ferroas2_core::{PartnerDirectory, ServerConfig};
use ferroas2_crypto::PemDirectoryStore;
use ferroas2_engine::{As2Services, EngineSettings};
use ferroas2_infra::TracingEventSink;
use ferroas2_storage::FileSystemStore;
use ferroas2_worker::Scheduler;

use crate::dispatch::EngineDispatch;

/// Load partners and certificates and assemble the engine services.
pub fn initialize_services(config: &ServerConfig) -> Result<Arc<As2Services>> {
    let partners = PartnerDirectory::load(config.partners_file())?;
    tracing::info!(
        company = %partners.company().as2id,
        partners = partners.partners().len(),
        "Loaded trading partners"
    );

    let certs = PemDirectoryStore::load(&config.directories.certs)
        .context("Failed to load certificate store")?;
    let store = FileSystemStore::new(config.directories.clone());

    let services = As2Services::new(
        Arc::new(certs),
        Arc::new(store),
        Arc::new(partners),
        EngineSettings::from_config(config),
    )?
    .with_events(Arc::new(TracingEventSink));

    Ok(Arc::new(services))
}

/// A scheduler watching one outbox directory per trading partner.
pub async fn initialize_scheduler(
    config: &ServerConfig,
    services: Arc<As2Services>,
) -> Result<Arc<Scheduler>> {
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(EngineDispatch::new(services.clone())),
        services.events.clone(),
    ));

    let company = services.partners.company().as2id.clone();
    for partner in services.partners.partners() {
        let outbox = config.directories.partner_outbox(&partner.as2id);
        tokio::fs::create_dir_all(&outbox)
            .await
            .with_context(|| format!("Failed to create outbox {}", outbox.display()))?;
        scheduler
            .watch_directory(WatchedDir::new(outbox, company.clone(), partner.as2id.clone()))
            .await;
    }

    tracing::debug!(report = %scheduler.status_report().await, "Scheduler initialized");
    Ok(scheduler)
}
