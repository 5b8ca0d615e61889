use std::sync::Arc;

use async_trait::async_trait;
use ferroas2_core::constants::header;
use ferroas2_core::disposition::{ERR_DECRYPTION, ERR_INTEGRITY_CHECK, ERR_UNEXPECTED};
use ferroas2_core::models::{IncomingFileMessage, MdnMode};
use ferroas2_core::validation::is_blank;
use ferroas2_core::{As2Error, DispositionType, PipelineContext, Stage};
use ferroas2_crypto::mime::header_param;
use ferroas2_crypto::{
    compute_mic, decrypt, is_encrypted, is_signed, mic_input, verify_and_unwrap, MimeEntity,
};

use super::InboundContext;
use crate::async_mdn::{AsyncMdnProcessor, AsyncMdnSender};
use crate::mdn::{build_reply_mdn, is_mdn, mdn_response, success_text};
use crate::services::As2Services;
use crate::transport::As2Response;

const NO_MDN_REQUESTED: &str = "File Received Ok, NO MDN was requested";

fn content(ctx: &InboundContext) -> Result<&MimeEntity, As2Error> {
    ctx.content
        .as_ref()
        .ok_or_else(|| As2Error::Internal("no extracted content".into()))
}

fn file_message(ctx: &InboundContext) -> Result<&IncomingFileMessage, As2Error> {
    ctx.file_message
        .as_ref()
        .ok_or_else(|| As2Error::Internal("no file message".into()))
}

pub(super) struct ValidateRequest;

#[async_trait]
impl Stage<InboundContext> for ValidateRequest {
    fn name(&self) -> &'static str {
        "ValidateRequest"
    }

    async fn process(&self, ctx: &mut InboundContext) -> Result<(), As2Error> {
        if !ctx.method.eq_ignore_ascii_case("POST") {
            return Err(As2Error::MethodNotAllowed(ctx.method.to_uppercase()));
        }
        if ctx.body.is_empty() {
            return Err(As2Error::Protocol(
                "Request did not contain a recognizable HTTP Entity".to_string(),
            ));
        }
        Ok(())
    }
}

pub(super) struct Extract {
    services: Arc<As2Services>,
}

impl Extract {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }

    fn decrypt(&self, ctx: &InboundContext, entity: &MimeEntity) -> Result<MimeEntity, As2Error> {
        let receiver = &ctx.request.receiver_id;
        let certs = &self.services.certs;
        certs
            .certificate(receiver)
            .and_then(|cert| {
                let key = certs.private_key(receiver)?;
                decrypt(entity, &cert, &key)
            })
            .map_err(|e| {
                tracing::error!(error = %e, "Error decrypting message");
                As2Error::disposition(
                    DispositionType::error(ERR_DECRYPTION),
                    format!(
                        "The message sent to Recipient {} by {} was received but an error occurred during decryption",
                        receiver, ctx.request.sender_id
                    ),
                )
            })
    }

    fn verify(&self, ctx: &InboundContext, entity: &MimeEntity) -> Result<MimeEntity, As2Error> {
        let sender = &ctx.request.sender_id;
        self.services
            .certs
            .certificate(sender)
            .and_then(|cert| verify_and_unwrap(entity, &cert))
            .map_err(|e| {
                tracing::error!(error = %e, "Error verifying signature");
                As2Error::disposition(
                    DispositionType::error(ERR_INTEGRITY_CHECK),
                    format!(
                        "The message sent to Recipient {} by {} was received and decrypted, but the sender's certificate could not be verified",
                        ctx.request.receiver_id, sender
                    ),
                )
            })
    }
}

#[async_trait]
impl Stage<InboundContext> for Extract {
    fn name(&self) -> &'static str {
        "Extract"
    }

    async fn process(&self, ctx: &mut InboundContext) -> Result<(), As2Error> {
        let content_type = ctx
            .request
            .request_headers
            .get_or_empty(header::CONTENT_TYPE)
            .to_string();
        let mut entity = MimeEntity::from_content(&content_type, ctx.body.clone());

        if is_encrypted(&entity) {
            entity = self.decrypt(ctx, &entity)?;
            ctx.was_encrypted_or_signed = true;
            tracing::debug!("Message decrypted");
        }
        if is_signed(&entity) {
            entity = self.verify(ctx, &entity)?;
            ctx.was_encrypted_or_signed = true;
            tracing::debug!("Signature verified");
        }

        tracing::debug!(content_type = %entity.content_type(), "Content extracted");
        ctx.content = Some(entity);
        Ok(())
    }
}

pub(super) struct HandleAsyncMdn {
    processor: AsyncMdnProcessor,
}

impl HandleAsyncMdn {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self {
            processor: AsyncMdnProcessor::new(services),
        }
    }
}

#[async_trait]
impl Stage<InboundContext> for HandleAsyncMdn {
    fn name(&self) -> &'static str {
        "HandleAsyncMdn"
    }

    async fn process(&self, ctx: &mut InboundContext) -> Result<(), As2Error> {
        let entity = content(ctx)?;
        if !is_mdn(entity) {
            return Ok(());
        }

        tracing::info!("Received an async MDN on the file endpoint");
        ctx.response = self.processor.respond(&ctx.request, entity).await;
        ctx.terminate();
        Ok(())
    }
}

pub(super) struct HandleFile {
    services: Arc<As2Services>,
}

impl HandleFile {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage<InboundContext> for HandleFile {
    fn name(&self) -> &'static str {
        "HandleFile"
    }

    async fn process(&self, ctx: &mut InboundContext) -> Result<(), As2Error> {
        let entity = content(ctx)?;
        let mut message = IncomingFileMessage::new(ctx.request.clone());

        let disposition_name = if ctx.was_encrypted_or_signed {
            entity.filename()
        } else {
            ctx.request
                .request_headers
                .get(header::CONTENT_DISPOSITION)
                .and_then(|value| header_param(value, "filename"))
        };
        if let Some(name) = disposition_name.filter(|name| !is_blank(name)) {
            message.file_name = name;
        }

        let saved = match entity.decoded_body() {
            Ok(data) => self
                .services
                .store
                .save_incoming_file(&message, &data)
                .await
                .map_err(As2Error::from),
            Err(e) => Err(As2Error::from(e)),
        };
        match saved {
            Ok(path) => {
                tracing::info!(path = %path.display(), file_name = %message.file_name, "Received file saved");
            }
            Err(e) => {
                tracing::error!(error = %e, "Error saving received file");
                return Err(As2Error::disposition(
                    DispositionType::error(ERR_UNEXPECTED),
                    format!(
                        "The message from {} to {} was decrypted and verified, but an error saving the file.",
                        message.sender_id(),
                        message.receiver_id()
                    ),
                ));
            }
        }

        ctx.file_message = Some(message);
        Ok(())
    }
}

pub(super) struct SendMdn {
    services: Arc<As2Services>,
}

impl SendMdn {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage<InboundContext> for SendMdn {
    fn name(&self) -> &'static str {
        "SendMdn"
    }

    async fn process(&self, ctx: &mut InboundContext) -> Result<(), As2Error> {
        let message = file_message(ctx)?;
        if message.mdn_mode == MdnMode::None {
            ctx.response = As2Response::text(200, NO_MDN_REQUESTED);
            return Ok(());
        }

        let from = &self.services.partners.company().email;
        let mut mdn = build_reply_mdn(
            message,
            &DispositionType::success(),
            from,
            success_text(message),
        )?;

        if !is_blank(&mdn.signed_receipt_mic_algorithm) {
            let entity = content(ctx)?;
            let mic = compute_mic(
                &mic_input(entity, ctx.was_encrypted_or_signed),
                &mdn.signed_receipt_mic_algorithm,
            )
            .map_err(|e| {
                tracing::error!(error = %e, algorithm = %mdn.signed_receipt_mic_algorithm, "MIC calculation failed");
                As2Error::disposition(
                    DispositionType::error(ERR_UNEXPECTED),
                    "Unable to calculate the MIC for your message",
                )
            })?;
            mdn.attributes.received_content_mic = mic;
        }

        if let Err(e) = self.services.store.save_reply_mdn(&mdn).await {
            tracing::error!(error = %e, "Failed to save reply MDN");
        }

        ctx.response = match mdn.mdn_mode {
            MdnMode::Async => {
                tracing::debug!(url = %mdn.async_reply_to_url, "Sending async MDN");
                AsyncMdnSender::new(self.services.clone()).spawn(mdn);
                As2Response::empty(200)
            }
            _ => mdn_response(self.services.certs.as_ref(), &mdn),
        };
        Ok(())
    }
}
