//! Outbound transfer pipeline
//!
//! `send_file` runs one [`OutgoingFileMessage`] through:
//!
//! 1. `BuildBody`: the file as a MIME entity with the partner's content type
//! 2. `SignAndEncrypt`: sign, then encrypt, per the partner agreement; computes the MIC
//! 3. `ValidateMessage`: content type, MIC and both party ids must be set
//! 4. `Transmit`: HTTP POST with the AS2 header set
//! 5. `ReceiveMdn`: read the sync MDN, or record a pending async MDN
//!
//! Events are published around the run, and a failed run marks the message as failed.

mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ferroas2_core::models::message::STATUS_FAILED;
use ferroas2_core::models::{IncomingSyncMdn, OutgoingFileMessage, PartnerRecord};
use ferroas2_core::{
    As2Error, As2Result, DoneHandler, FailureHandler, Headers, Phase, Pipeline, PipelineContext,
};
use ferroas2_crypto::MimeEntity;

use crate::events::{Emit, MessageScoped};
use crate::services::As2Services;
use stages::{BuildBody, ReceiveMdn, SignAndEncrypt, Transmit, ValidateMessage};

/// Partner reply to the POST, read in full.
#[derive(Debug, Clone)]
pub struct PartnerReply {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

pub struct OutboundContext {
    pub message: OutgoingFileMessage,
    pub partner: Option<PartnerRecord>,
    /// The file as a MIME entity, before signing and encryption.
    pub content: Option<MimeEntity>,
    /// What goes on the wire.
    pub body: Option<MimeEntity>,
    pub reply: Option<PartnerReply>,
    pub mdn: Option<IncomingSyncMdn>,
    pub failure: Option<String>,
    terminated: bool,
}

impl OutboundContext {
    pub fn new(message: OutgoingFileMessage) -> Self {
        Self {
            message,
            partner: None,
            content: None,
            body: None,
            reply: None,
            mdn: None,
            failure: None,
            terminated: false,
        }
    }

    pub(crate) fn partner(&self) -> As2Result<&PartnerRecord> {
        self.partner
            .as_ref()
            .ok_or_else(|| As2Error::Internal("partner record not resolved".into()))
    }
}

impl PipelineContext for OutboundContext {
    fn terminate(&mut self) {
        self.terminated = true;
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl MessageScoped for OutboundContext {
    fn event_message_id(&self) -> String {
        self.message.message_id.clone()
    }
}

/// Drops the partner connection state, whatever happened.
struct ReleaseResponse;

#[async_trait]
impl DoneHandler<OutboundContext> for ReleaseResponse {
    async fn on_done(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        ctx.reply = None;
        ctx.body = None;
        Ok(())
    }
}

/// Leaves the failure on the message for the caller.
struct RecordFailure;

#[async_trait]
impl FailureHandler<OutboundContext> for RecordFailure {
    async fn on_failure(&self, ctx: &mut OutboundContext, error: &As2Error) -> Result<(), As2Error> {
        ctx.message.status = STATUS_FAILED.to_string();
        ctx.failure = Some(error.to_string());
        Ok(())
    }
}

pub struct FileSender {
    pipeline: Pipeline<OutboundContext>,
}

impl FileSender {
    pub fn new(services: Arc<As2Services>) -> Self {
        let events = services.events.clone();
        let pipeline = Pipeline::new("file-send")
            .stage(Emit::new(events.clone(), Phase::FileSend, "Starting to send file"))
            .stage(BuildBody::new(services.clone()))
            .stage(SignAndEncrypt::new(services.clone()))
            .stage(ValidateMessage)
            .stage(Transmit::new(services.clone()))
            .stage(ReceiveMdn::new(services))
            .on_done(ReleaseResponse)
            .on_done(Emit::new(events.clone(), Phase::FileSend, "File Send Finished"))
            .on_failure(Emit::new(events, Phase::FileSend, "Error Sending File"))
            .on_failure(RecordFailure);

        Self { pipeline }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// Send one file. On success the returned message carries the final status
    /// (`sent`, `pending` or `mic-mismatch`) and the outgoing MIC.
    #[tracing::instrument(skip(self, message), fields(message_id = %message.message_id, partner = %message.receiver_id))]
    pub async fn send_file(&self, message: OutgoingFileMessage) -> As2Result<OutgoingFileMessage> {
        let start = std::time::Instant::now();
        let mut ctx = OutboundContext::new(message);
        let outcome = self.pipeline.run(&mut ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome.into_result() {
            Ok(()) => {
                tracing::info!(status = %ctx.message.status, duration_ms, "File send finished");
                Ok(ctx.message)
            }
            Err(e) => {
                tracing::warn!(error = %e, duration_ms, "File send failed");
                Err(e)
            }
        }
    }
}
