//! Receipt validation for async MDNs.
//!
//! Shared by the async MDN endpoint and the file endpoint, since some partners
//! deliver async MDNs to the URL they receive files on.

use std::sync::Arc;
use std::time::Duration;

use ferroas2_core::models::{
    IncomingAsyncMdn, IncomingMessage, MdnReceiveStatus, PendingMdnInfoFile,
};
use ferroas2_core::{DispositionType, Phase};
use ferroas2_crypto::{validate_returned_mic, MimeEntity};
use ferroas2_storage::StorageResult;

use crate::mdn::parse_mdn;
use crate::services::As2Services;
use crate::transport::As2Response;

const PENDING_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct AsyncMdnProcessor {
    services: Arc<As2Services>,
}

impl AsyncMdnProcessor {
    pub fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }

    /// Load the pending record for `message_id`, polling until the configured wait
    /// runs out. The receipt can arrive while the send is still reading the
    /// partner's HTTP reply, before the record exists.
    async fn wait_for_pending(&self, message_id: &str) -> StorageResult<PendingMdnInfoFile> {
        let deadline = tokio::time::Instant::now() + self.services.settings.pending_mdn_wait;
        loop {
            match self.services.store.load_pending_mdn(message_id).await {
                Ok(pending) => return Ok(pending),
                Err(e) if tokio::time::Instant::now() >= deadline => return Err(e),
                Err(_) => tokio::time::sleep(PENDING_POLL_INTERVAL).await,
            }
        }
    }

    /// Process an MDN that has already been verified, and map the result to the
    /// response for the partner that delivered it.
    pub async fn respond(&self, request: &IncomingMessage, content: &MimeEntity) -> As2Response {
        let status = self.process(request, content).await;
        As2Response::text(status.http_status(), status.reply_text())
    }

    #[tracing::instrument(skip(self, request, content), fields(sender = %request.sender_id, receiver = %request.receiver_id))]
    pub async fn process(&self, request: &IncomingMessage, content: &MimeEntity) -> MdnReceiveStatus {
        let events = &self.services.events;
        let mut mdn = IncomingAsyncMdn::from_request(request);

        let parsed = match parse_mdn(content) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                tracing::debug!("Report did not contain a disposition notification");
                return MdnReceiveStatus::NoContent;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unable to read MDN");
                return MdnReceiveStatus::NoContent;
            }
        };
        mdn.attributes = parsed.attributes;
        mdn.body_text = parsed.body_text;
        let message_id = mdn.logging_text().to_string();

        if let Err(e) = self.services.store.save_async_mdn(&mdn).await {
            tracing::error!(error = %e, message_id = %message_id, "Failed to save async MDN");
        }

        let disposition = DispositionType::parse(&mdn.attributes.content_disposition);
        if !disposition.is_format_valid() {
            tracing::debug!(
                message_id = %message_id,
                disposition = %mdn.attributes.content_disposition,
                "MDN disposition returned by the partner is invalid"
            );
            events.error(
                Phase::MdnAsyncReceive,
                &message_id,
                "Invalid disposition in MDN",
                Some(&mdn.attributes.content_disposition),
            );
            return MdnReceiveStatus::InvalidDisposition;
        }
        if !disposition.is_success() {
            tracing::debug!(
                message_id = %message_id,
                disposition = %disposition,
                "MDN indicates that processing failed"
            );
            events.error(
                Phase::MdnAsyncReceive,
                &message_id,
                "Partner reported a processing failure",
                Some(&mdn.body_text),
            );
            return MdnReceiveStatus::ProcessingFailed;
        }

        let original_message_id = &mdn.attributes.original_message_id;
        let pending = match self.wait_for_pending(original_message_id).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    message_id = %message_id,
                    "Error loading pending MDN info, maybe already received?"
                );
                return MdnReceiveStatus::AsyncLoadError;
            }
        };

        if !validate_returned_mic(&pending.outgoing_mic, &mdn.attributes.received_content_mic) {
            tracing::info!(
                message_id = %message_id,
                expected = %pending.outgoing_mic,
                returned = %mdn.attributes.received_content_mic,
                "MIC not matched"
            );
            events.error(
                Phase::MdnAsyncReceive,
                &message_id,
                "MIC does not match",
                Some(&format!(
                    "expected '{}', got '{}'",
                    pending.outgoing_mic, mdn.attributes.received_content_mic
                )),
            );
            return MdnReceiveStatus::MicNotMatched;
        }

        if let Err(e) = self.services.store.delete_pending_mdn(original_message_id).await {
            tracing::error!(error = %e, message_id = %message_id, "Failed to delete pending MDN");
        }
        events.info(Phase::MdnAsyncReceive, &message_id, "MDN received successfully");
        MdnReceiveStatus::Ok
    }
}
