//! Hands scheduled outbox files to the send pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ferroas2_core::models::{OutgoingFileMessage, WatchedFile};
use ferroas2_engine::{As2Services, FileSender};
use ferroas2_worker::SendDispatch;

pub struct EngineDispatch {
    sender: FileSender,
}

impl EngineDispatch {
    pub fn new(services: Arc<As2Services>) -> Self {
        Self {
            sender: FileSender::new(services),
        }
    }
}

#[async_trait]
impl SendDispatch for EngineDispatch {
    async fn send_file(&self, file: &WatchedFile) -> Result<()> {
        let message = OutgoingFileMessage::new(&file.file, &file.sender_id, &file.receiver_id);
        let sent = self
            .sender
            .send_file(message)
            .await
            .with_context(|| format!("Failed to send {}", file.file.display()))?;

        tracing::info!(
            message_id = %sent.message_id,
            partner = %file.receiver_id,
            status = %sent.status,
            "Scheduled file sent"
        );
        Ok(())
    }
}
