//! Inbound receive pipeline
//!
//! Stages, in order:
//!
//! 1. `ValidateRequest`: POST with an entity
//! 2. `Extract`: decrypt and verify the body
//! 3. `HandleAsyncMdn`: an MDN posted to the file endpoint goes to the async MDN
//!    processor and ends the run
//! 4. `HandleFile`: persist the file
//! 5. `SendMdn`: reply per the requested MDN mode
//!
//! Failures with a disposition are answered with an error MDN when one was requested;
//! everything else gets a 500.

mod stages;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ferroas2_core::constants::header;
use ferroas2_core::models::{IncomingFileMessage, IncomingMessage, MdnMode};
use ferroas2_core::{log_error, As2Error, FailureHandler, Phase, Pipeline, PipelineContext};
use ferroas2_crypto::MimeEntity;

use crate::async_mdn::AsyncMdnSender;
use crate::events::{Emit, MessageScoped};
use crate::mdn::{build_reply_mdn, mdn_response};
use crate::services::As2Services;
use crate::transport::{As2Response, InboundRequest};
use stages::{Extract, HandleAsyncMdn, HandleFile, SendMdn, ValidateRequest};

const UNKNOWN_ERROR: &str = "An unknown error occurred processing the file";

pub struct InboundContext {
    pub request: IncomingMessage,
    pub method: String,
    pub body: Bytes,
    /// Decrypted and verified content.
    pub content: Option<MimeEntity>,
    pub was_encrypted_or_signed: bool,
    pub file_message: Option<IncomingFileMessage>,
    pub response: As2Response,
    terminated: bool,
}

impl InboundContext {
    pub fn new(request: &InboundRequest) -> Self {
        Self {
            request: request.to_incoming_message(),
            method: request.method.clone(),
            body: request.body.clone(),
            content: None,
            was_encrypted_or_signed: false,
            file_message: None,
            response: As2Response::default(),
            terminated: false,
        }
    }

    /// The file message, or a fresh one when the run failed before it was built.
    fn file_message_or_new(&self) -> IncomingFileMessage {
        self.file_message
            .clone()
            .unwrap_or_else(|| IncomingFileMessage::new(self.request.clone()))
    }
}

impl PipelineContext for InboundContext {
    fn terminate(&mut self) {
        self.terminated = true;
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl MessageScoped for InboundContext {
    fn event_message_id(&self) -> String {
        self.request
            .request_headers
            .get_or_empty(header::MESSAGE_ID)
            .trim()
            .to_string()
    }
}

/// Turns a failed run into the response for the partner.
struct RespondWithError {
    services: Arc<As2Services>,
}

impl RespondWithError {
    async fn error_mdn(
        &self,
        ctx: &InboundContext,
        error: &As2Error,
    ) -> Result<Option<As2Response>, As2Error> {
        let Some(disposition) = error.disposition_type() else {
            return Ok(None);
        };
        let file_message = ctx.file_message_or_new();
        if file_message.mdn_mode == MdnMode::None {
            return Ok(None);
        }

        let from = &self.services.partners.company().email;
        let mdn = build_reply_mdn(&file_message, disposition, from, error.to_string())?;
        if let Err(e) = self.services.store.save_reply_mdn(&mdn).await {
            tracing::error!(error = %e, "Failed to save error MDN");
        }

        match mdn.mdn_mode {
            MdnMode::Async => {
                AsyncMdnSender::new(self.services.clone()).spawn(mdn);
                Ok(Some(As2Response::empty(200)))
            }
            _ => Ok(Some(mdn_response(self.services.certs.as_ref(), &mdn))),
        }
    }
}

#[async_trait]
impl FailureHandler<InboundContext> for RespondWithError {
    async fn on_failure(&self, ctx: &mut InboundContext, error: &As2Error) -> Result<(), As2Error> {
        match self.error_mdn(ctx, error).await {
            Ok(Some(response)) => {
                tracing::info!(disposition_error = %error, "Replying with an error MDN");
                ctx.response = response;
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Unable to build an error MDN"),
        }

        log_error(error, "No error MDN for this failure, answering with 500");
        let text = error.to_string();
        ctx.response = if text.trim().is_empty() {
            As2Response::text(500, UNKNOWN_ERROR)
        } else {
            As2Response::text(500, text)
        };
        Ok(())
    }
}

pub struct FileReceiver {
    pipeline: Pipeline<InboundContext>,
}

impl FileReceiver {
    pub fn new(services: Arc<As2Services>) -> Self {
        let events = services.events.clone();
        let pipeline = Pipeline::new("file-receive")
            .stage(Emit::new(events.clone(), Phase::FileReceive, "Starting file receive"))
            .stage(ValidateRequest)
            .stage(Extract::new(services.clone()))
            .stage(HandleAsyncMdn::new(services.clone()))
            .stage(HandleFile::new(services.clone()))
            .stage(SendMdn::new(services.clone()))
            .on_done(Emit::new(events.clone(), Phase::FileReceive, "File receive finished"))
            .on_failure(RespondWithError { services })
            .on_failure(Emit::new(events, Phase::FileReceive, "Error receiving file"));

        Self { pipeline }
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, size_bytes = request.body.len()))]
    pub async fn receive(&self, request: InboundRequest) -> As2Response {
        let start = std::time::Instant::now();
        let mut ctx = InboundContext::new(&request);
        let outcome = self.pipeline.run(&mut ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = outcome.into_result() {
            tracing::warn!(
                error = %e,
                status = ctx.response.status,
                duration_ms,
                "File receive failed"
            );
        } else {
            tracing::info!(status = ctx.response.status, duration_ms, "File receive finished");
        }
        ctx.response
    }
}
