//! Application state shared by the HTTP handlers.

use std::sync::Arc;

use ferroas2_engine::{As2Services, AsyncMdnReceiver, FileReceiver};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<As2Services>,
    pub file_receiver: Arc<FileReceiver>,
    pub mdn_receiver: Arc<AsyncMdnReceiver>,
    /// Largest request body accepted on either listener.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(services: Arc<As2Services>, max_body_bytes: usize) -> Self {
        Self {
            file_receiver: Arc::new(FileReceiver::new(services.clone())),
            mdn_receiver: Arc::new(AsyncMdnReceiver::new(services.clone())),
            services,
            max_body_bytes,
        }
    }
}
