//! Delivers reply MDNs to the partner's `Receipt-Delivery-Option` URL.

use std::sync::Arc;

use ferroas2_core::constants::{header, is_valid_response_code};
use ferroas2_core::models::ReplyMdn;
use ferroas2_core::validation::is_blank;
use ferroas2_core::{As2Error, As2Result, Phase};

use crate::mdn::signed_mdn_entity;
use crate::services::As2Services;

#[derive(Clone)]
pub struct AsyncMdnSender {
    services: Arc<As2Services>,
}

impl AsyncMdnSender {
    pub fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }

    /// Send in the background. Failures are logged and reported, never returned.
    pub fn spawn(&self, mdn: ReplyMdn) -> tokio::task::JoinHandle<()> {
        let sender = self.clone();
        tokio::spawn(async move {
            let message_id = mdn.attributes.original_message_id.clone();
            match sender.send(&mdn).await {
                Ok(()) => {
                    sender
                        .services
                        .events
                        .info(Phase::MdnSend, &message_id, "Async MDN sent");
                }
                Err(e) => {
                    tracing::warn!(error = %e, message_id = %message_id, "Error sending async MDN");
                    sender.services.events.error(
                        Phase::MdnSend,
                        &message_id,
                        "Error sending async MDN",
                        Some(&e.to_string()),
                    );
                }
            }
        })
    }

    #[tracing::instrument(skip(self, mdn), fields(message_id = %mdn.attributes.original_message_id, url = %mdn.async_reply_to_url))]
    pub async fn send(&self, mdn: &ReplyMdn) -> As2Result<()> {
        if is_blank(&mdn.async_reply_to_url) {
            return Err(As2Error::Protocol(
                "No Receipt-Delivery-Option URL to send the MDN to".to_string(),
            ));
        }

        let entity = signed_mdn_entity(self.services.certs.as_ref(), mdn);
        let body = entity.body().clone();

        let mut request = self.services.http.post(&mdn.async_reply_to_url);
        for (name, value) in mdn.response_headers.iter() {
            request = request.header(name, value);
        }
        request = request.header(header::CONTENT_TYPE, entity.content_type());

        tracing::debug!(
            size_bytes = body.len(),
            content_type = %entity.content_type(),
            "Async MDN POST prepared"
        );

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| As2Error::transport(None, format!("Failed to send async MDN: {}", e)))?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "Async MDN reply received");
        if !is_valid_response_code(status.as_u16()) {
            tracing::error!(
                status = status.as_u16(),
                message_id = %mdn.attributes.original_message_id,
                "Failed to send async MDN"
            );
            return Err(As2Error::transport(
                Some(status.as_u16()),
                format!(
                    "Unexpected response from {}: {}",
                    mdn.async_reply_to_url, status
                ),
            ));
        }
        // drain so the connection closes cleanly
        let _ = response.bytes().await;
        Ok(())
    }
}
