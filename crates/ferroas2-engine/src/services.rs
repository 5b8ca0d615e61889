//! Everything a pipeline needs from the outside world, built once at startup and
//! shared behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ferroas2_core::constants::AS2_SERVER_SENDER_NAME;
use ferroas2_core::{EventSink, NoOpEventSink, PartnerDirectory, ServerConfig};
use ferroas2_crypto::CertificateStore;
use ferroas2_storage::As2Store;
use reqwest::Client;

/// Engine settings derived from the server configuration.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Sent as `Receipt-Delivery-Option` when a partner wants async MDNs.
    pub async_mdn_url: String,
    pub http_timeout: Duration,
    /// How long an async MDN waits for the pending record of the message it
    /// acknowledges. A partner can answer before the send has written that record.
    pub pending_mdn_wait: Duration,
}

const PENDING_MDN_WAIT: Duration = Duration::from_secs(10);

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            async_mdn_url: "http://localhost:4081".to_string(),
            http_timeout: Duration::from_secs(120),
            pending_mdn_wait: PENDING_MDN_WAIT,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            async_mdn_url: config.async_mdn_url(),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
            pending_mdn_wait: PENDING_MDN_WAIT,
        }
    }
}

pub struct As2Services {
    pub certs: Arc<dyn CertificateStore>,
    pub store: Arc<dyn As2Store>,
    pub partners: Arc<PartnerDirectory>,
    pub events: Arc<dyn EventSink>,
    pub http: Client,
    pub settings: EngineSettings,
}

impl As2Services {
    pub fn new(
        certs: Arc<dyn CertificateStore>,
        store: Arc<dyn As2Store>,
        partners: Arc<PartnerDirectory>,
        settings: EngineSettings,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(AS2_SERVER_SENDER_NAME)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client for partner connections")?;

        Ok(Self {
            certs,
            store,
            partners,
            events: Arc::new(NoOpEventSink),
            http,
            settings,
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}
