use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ferroas2_core::constants::{
    header, is_valid_response_code, AS2_PROTOCOL_VERSION, AS2_SERVER_SENDER_NAME, MIME_VERSION,
};
use ferroas2_core::models::message::{STATUS_MIC_MISMATCH, STATUS_SENT};
use ferroas2_core::models::{IncomingSyncMdn, MdnMode};
use ferroas2_core::validation::is_blank;
use ferroas2_core::{As2Error, DispositionOptions, DispositionType, Headers, Phase, Stage};
use ferroas2_crypto::{
    compute_mic, encrypt, is_signed, mic_input, sign, validate_returned_mic, verify_and_unwrap,
    CipherAlgorithm, DigestAlgorithm, MimeEntity,
};

use super::{OutboundContext, PartnerReply};
use crate::mdn::parse_mdn;
use crate::services::As2Services;

const DEFAULT_MIC_ALGORITHM: &str = "sha1";

pub(super) struct BuildBody {
    services: Arc<As2Services>,
}

impl BuildBody {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage<OutboundContext> for BuildBody {
    fn name(&self) -> &'static str {
        "BuildBody"
    }

    async fn process(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        let partner = self
            .services
            .partners
            .partner(&ctx.message.receiver_id)
            .cloned()
            .ok_or_else(|| {
                As2Error::Config(format!(
                    "No partner record for '{}'",
                    ctx.message.receiver_id
                ))
            })?;

        let data = tokio::fs::read(&ctx.message.file_path).await?;
        let settings = &partner.send_settings;

        // transfer encoding must stay binary, the MIC depends on the exact bytes
        let content = MimeEntity::from_content(&settings.content_type, data)
            .with_header(header::CONTENT_TRANSFER_ENCODING, settings.transfer_encoding())
            .with_header(
                header::CONTENT_DISPOSITION,
                format!("Attachment; filename=\"{}\"", ctx.message.file_name()),
            );

        tracing::debug!(
            size_bytes = content.body().len(),
            content_type = %settings.content_type,
            "Built MIME body"
        );
        ctx.content = Some(content);
        ctx.partner = Some(partner);
        Ok(())
    }
}

pub(super) struct SignAndEncrypt {
    services: Arc<As2Services>,
}

impl SignAndEncrypt {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }
}

/// MIC algorithm requested in the MDN options, else the signing digest, else SHA1.
fn mic_algorithm(mdn_options: &str, sign_algorithm: &str) -> String {
    if let Ok(options) = DispositionOptions::parse(mdn_options) {
        if !is_blank(&options.mic_algorithm) {
            return options.mic_algorithm;
        }
    }
    if !is_blank(sign_algorithm) {
        return sign_algorithm.trim().to_string();
    }
    DEFAULT_MIC_ALGORITHM.to_string()
}

#[async_trait]
impl Stage<OutboundContext> for SignAndEncrypt {
    fn name(&self) -> &'static str {
        "SignAndEncrypt"
    }

    async fn process(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        let partner = ctx.partner()?.clone();
        let content = ctx
            .content
            .clone()
            .ok_or_else(|| As2Error::Internal("no MIME body to send".into()))?;
        let settings = &partner.send_settings;
        let certs = &self.services.certs;

        let mut body = content.clone();
        if partner.should_sign() {
            let cert = certs.certificate(&ctx.message.sender_id)?;
            let key = certs.private_key(&ctx.message.sender_id)?;
            body = sign(
                &body,
                &cert,
                &key,
                DigestAlgorithm::from_alias(&settings.sign_algorithm),
            )?;
            tracing::debug!(algorithm = %settings.sign_algorithm, "Message signed successfully");
        }
        if partner.should_encrypt() {
            let cert = certs.certificate(&ctx.message.receiver_id)?;
            body = encrypt(
                &body,
                &cert,
                CipherAlgorithm::from_alias(&settings.encrypt_algorithm),
            )?;
            tracing::debug!(algorithm = %settings.encrypt_algorithm, "Message encrypted successfully");
        }

        let wrapped = partner.should_sign() || partner.should_encrypt();
        let algorithm = mic_algorithm(&settings.mdn_options, &settings.sign_algorithm);
        ctx.message.outgoing_mic = compute_mic(&mic_input(&content, wrapped), &algorithm)?;
        ctx.message.content_type = body.content_type().to_string();
        ctx.message.content_disposition = settings.mdn_options.clone();
        ctx.body = Some(body);
        Ok(())
    }
}

pub(super) struct ValidateMessage;

#[async_trait]
impl Stage<OutboundContext> for ValidateMessage {
    fn name(&self) -> &'static str {
        "ValidateMessage"
    }

    async fn process(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        let message = &ctx.message;
        for (value, what) in [
            (&message.content_type, "Content Type"),
            (&message.outgoing_mic, "MIC code"),
            (&message.sender_id, "Sender ID"),
            (&message.receiver_id, "Receiver ID"),
        ] {
            if is_blank(value) {
                return Err(As2Error::InvalidFormat(format!(
                    "message: {} may not be empty",
                    what
                )));
            }
        }
        Ok(())
    }
}

pub(super) struct Transmit {
    services: Arc<As2Services>,
}

impl Transmit {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }

    fn outgoing_headers(&self, ctx: &OutboundContext) -> Result<Headers, As2Error> {
        let partner = ctx.partner()?;
        let settings = &partner.send_settings;
        let message = &ctx.message;

        let mut headers = Headers::new();
        headers.insert("Connection", "close, TE");
        headers.insert("User-Agent", AS2_SERVER_SENDER_NAME);
        headers.insert("Date", Utc::now().to_rfc2822());
        headers.insert(header::MIME_VERSION, MIME_VERSION);
        headers.insert(header::MESSAGE_ID, message.message_id.as_str());
        headers.insert("Recipient-Address", settings.url.as_str());
        headers.insert(header::CONTENT_TYPE, message.content_type.as_str());
        headers.insert(header::AS2_VERSION, AS2_PROTOCOL_VERSION);
        headers.insert(header::AS2_TO, message.receiver_id.as_str());
        headers.insert(header::AS2_FROM, message.sender_id.as_str());
        headers.insert(
            "Subject",
            format!("From {} to {}", message.sender_id, message.receiver_id),
        );
        headers.insert("From", self.services.partners.company().email.as_str());

        if settings.mdn_mode != MdnMode::None {
            headers.insert(header::DISPOSITION_NOTIFICATION_TO, partner.email.as_str());
            headers.insert(
                header::DISPOSITION_NOTIFICATION_OPTIONS,
                message.content_disposition.as_str(),
            );
        }
        if settings.mdn_mode == MdnMode::Async {
            headers.insert(
                header::RECEIPT_DELIVERY_OPTION,
                self.services.settings.async_mdn_url.as_str(),
            );
        }
        headers.insert(
            header::CONTENT_DISPOSITION,
            format!("Attachment; filename=\"{}\"", message.file_name()),
        );
        Ok(headers)
    }
}

#[async_trait]
impl Stage<OutboundContext> for Transmit {
    fn name(&self) -> &'static str {
        "Transmit"
    }

    async fn process(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        let url = ctx.partner()?.send_settings.url.clone();
        if is_blank(&url) {
            return Err(As2Error::Config(format!(
                "Partner '{}' has no URL to send to",
                ctx.message.receiver_id
            )));
        }
        let body = ctx
            .body
            .as_ref()
            .map(|b| b.body().clone())
            .ok_or_else(|| As2Error::Internal("no MIME body to send".into()))?;
        let headers = self.outgoing_headers(ctx)?;

        tracing::debug!(url = %url, size_bytes = body.len(), "Posting file to partner");
        let mut request = self.services.http.post(&url);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| As2Error::transport(None, format!("Failed to send file to {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let response_headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let reply_body = response
            .bytes()
            .await
            .map_err(|e| As2Error::transport(Some(status), format!("Failed to read response: {}", e)))?;

        tracing::debug!(status, size_bytes = reply_body.len(), "Partner responded");
        ctx.reply = Some(PartnerReply {
            status,
            headers: response_headers,
            body: reply_body,
        });

        if !is_valid_response_code(status) {
            return Err(As2Error::transport(
                Some(status),
                "Server responded with an invalid status code",
            ));
        }
        Ok(())
    }
}

pub(super) struct ReceiveMdn {
    services: Arc<As2Services>,
}

impl ReceiveMdn {
    pub(super) fn new(services: Arc<As2Services>) -> Self {
        Self { services }
    }

    async fn receive_sync_mdn(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        let events = &self.services.events;
        let message_id = ctx.message.message_id.clone();
        let reply = ctx
            .reply
            .clone()
            .ok_or_else(|| As2Error::Internal("no partner response to read the MDN from".into()))?;

        events.info(Phase::MdnReceive, &message_id, "Receiving MDN");
        if reply.body.is_empty() {
            let text = "Expected an MDN reply (non-async), but body was empty";
            events.error(Phase::MdnReceive, &message_id, text, None);
            return Err(As2Error::transport(Some(reply.status), text));
        }

        let mut entity = MimeEntity::from_content(
            reply.headers.get_or_empty(header::CONTENT_TYPE),
            reply.body.clone(),
        );
        if is_signed(&entity) {
            let signer = reply.headers.get_or_empty(header::AS2_FROM).trim();
            let cert = self.services.certs.certificate(signer)?;
            entity = verify_and_unwrap(&entity, &cert)?;
        }

        let parsed = parse_mdn(&entity)?.ok_or_else(|| {
            As2Error::Mime("MDN reply did not contain a disposition notification".into())
        })?;
        let mdn = IncomingSyncMdn {
            body_text: parsed.body_text,
            attributes: parsed.attributes,
            message_id: message_id.clone(),
            response_headers: reply.headers.clone(),
        };
        tracing::debug!(attributes = ?mdn.attributes, "MDN attributes");
        self.services.store.save_sync_mdn(&mdn).await?;

        let disposition = DispositionType::parse(&mdn.attributes.content_disposition);
        if !disposition.is_success() {
            events.error(
                Phase::MdnReceive,
                &message_id,
                &format!(
                    "Remote server reported an error receiving the message: {}",
                    disposition.disposition_description
                ),
                Some(&mdn.body_text),
            );
            let text = mdn.body_text.clone();
            ctx.mdn = Some(mdn);
            return Err(As2Error::Disposition {
                disposition,
                message: "Disposition indicates a server processing error".to_string(),
                text: Some(text),
            });
        }

        if validate_returned_mic(&ctx.message.outgoing_mic, &mdn.attributes.received_content_mic) {
            ctx.message.status = STATUS_SENT.to_string();
        } else {
            tracing::info!(
                expected = %ctx.message.outgoing_mic,
                returned = %mdn.attributes.received_content_mic,
                "MIC not matched"
            );
            events.error(
                Phase::MdnReceive,
                &message_id,
                "MIC does not match",
                Some(&format!(
                    "expected '{}', got '{}'",
                    ctx.message.outgoing_mic, mdn.attributes.received_content_mic
                )),
            );
            ctx.message.status = STATUS_MIC_MISMATCH.to_string();
        }
        events.info(Phase::MdnReceive, &message_id, "MDN received");
        ctx.mdn = Some(mdn);
        Ok(())
    }
}

#[async_trait]
impl Stage<OutboundContext> for ReceiveMdn {
    fn name(&self) -> &'static str {
        "ReceiveMdn"
    }

    async fn process(&self, ctx: &mut OutboundContext) -> Result<(), As2Error> {
        let mode = ctx.partner()?.send_settings.mdn_mode;
        match mode {
            MdnMode::Async => {
                self.services.store.save_pending_mdn(&mut ctx.message).await?;
                tracing::info!("Waiting for async MDN");
                return Ok(());
            }
            MdnMode::Standard => self.receive_sync_mdn(ctx).await?,
            MdnMode::None => {
                tracing::debug!("No MDN was requested");
                ctx.message.status = STATUS_SENT.to_string();
            }
        }

        let archived = self.services.store.archive_sent_file(&ctx.message).await?;
        tracing::debug!(path = %archived.display(), "Sent file archived");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroas2_core::models::OutgoingFileMessage;

    fn ready_context() -> OutboundContext {
        let mut message = OutgoingFileMessage::new("outbox/partnerb/po.edi", "acme", "partnerb");
        message.content_type = "application/edi-x12".to_string();
        message.outgoing_mic = "rZ1u7H1bHhGzXf2mX5bN3Q==, sha1".to_string();
        OutboundContext::new(message)
    }

    #[tokio::test]
    async fn test_validate_message_accepts_complete_message() {
        ValidateMessage.process(&mut ready_context()).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_message_rejects_blank_fields() {
        let blank_out: [(fn(&mut OutgoingFileMessage), &str); 4] = [
            (|m| m.content_type.clear(), "Content Type"),
            (|m| m.outgoing_mic = "  ".to_string(), "MIC code"),
            (|m| m.sender_id.clear(), "Sender ID"),
            (|m| m.receiver_id = "\t".to_string(), "Receiver ID"),
        ];

        for (blank, what) in blank_out {
            let mut ctx = ready_context();
            blank(&mut ctx.message);
            let err = ValidateMessage.process(&mut ctx).await.unwrap_err();
            assert!(matches!(err, As2Error::InvalidFormat(_)), "{}: {:?}", what, err);
            assert!(err.to_string().contains(&format!("{} may not be empty", what)));
        }
    }

    #[test]
    fn test_mic_algorithm_selection() {
        assert_eq!(
            mic_algorithm(
                "signed-receipt-protocol=optional,pkcs7-signature; signed-receipt-micalg=optional,sha-256",
                "SHA1"
            ),
            "sha-256"
        );
        assert_eq!(mic_algorithm("", "SHA1"), "SHA1");
        assert_eq!(mic_algorithm("garbage", " "), "sha1");
    }
}
