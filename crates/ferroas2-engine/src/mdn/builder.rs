//! Reply MDNs for files we receive.

use chrono::Utc;
use ferroas2_core::constants::{
    header, AS2_PROTOCOL_VERSION, AS2_SERVER_SENDER_NAME, MIME_VERSION,
};
use ferroas2_core::models::{IncomingFileMessage, MdnMode, ReplyMdn};
use ferroas2_core::validation::is_blank;
use ferroas2_core::{As2Result, DispositionOptions, DispositionType, Headers};
use ferroas2_crypto::{sign, CertificateStore, DigestAlgorithm, MimeEntity};

use super::{field, DISPOSITION_NOTIFICATION_TYPE, REPORT_TYPE};
use crate::transport::As2Response;

/// Body text of a successful receipt.
pub fn success_text(message: &IncomingFileMessage) -> String {
    format!(
        "The AS2 message {} sent from {} to {} was received successfully",
        message.message_id,
        message.sender_id(),
        message.receiver_id()
    )
}

/// Reply MDN for `message`, addressed back to its sender.
///
/// The reply is signed when the request carried `Disposition-Notification-Options`
/// naming a protocol, and the MIC algorithm comes from the same header. A malformed
/// options header is an error.
pub fn build_reply_mdn(
    message: &IncomingFileMessage,
    disposition: &DispositionType,
    from: &str,
    body_text: impl Into<String>,
) -> As2Result<ReplyMdn> {
    let request_headers = &message.request.request_headers;
    let connection = &message.request.connection;

    let mut mdn = ReplyMdn {
        mdn_mode: message.mdn_mode,
        partner_id: message.sender_id().to_string(),
        company_id: message.receiver_id().to_string(),
        body_text: body_text.into(),
        ..Default::default()
    };

    if message.mdn_mode == MdnMode::Async {
        mdn.async_reply_to_url = request_headers
            .get_or_empty(header::RECEIPT_DELIVERY_OPTION)
            .trim()
            .to_string();
    }

    let mut headers = Headers::new();
    headers.insert("Connection", "close, TE");
    headers.insert(header::AS2_VERSION, AS2_PROTOCOL_VERSION);
    headers.insert("Date", Utc::now().to_rfc2822());
    headers.insert("Server", AS2_SERVER_SENDER_NAME);
    headers.insert(header::MIME_VERSION, MIME_VERSION);
    // from/to swap: we answer the sender
    headers.insert(header::AS2_FROM, message.receiver_id());
    headers.insert(header::AS2_TO, message.sender_id());
    headers.insert("From", from);
    headers.insert("Subject", "MDN Response");
    mdn.response_headers = headers;

    mdn.attributes.reporting_ua = format!(
        "{}@{}:{}",
        AS2_SERVER_SENDER_NAME, connection.destination_ip, connection.destination_port
    );
    mdn.attributes.original_recipient = format!("rfc822; {}", message.receiver_id());
    mdn.attributes.final_recipient = format!("rfc822; {}", message.receiver_id());
    mdn.attributes.original_message_id = request_headers
        .get_or_empty(header::MESSAGE_ID)
        .trim()
        .to_string();
    mdn.attributes.content_disposition = disposition.to_string();

    if request_headers.is_present(header::DISPOSITION_NOTIFICATION_OPTIONS) {
        let options = DispositionOptions::parse(
            request_headers.get_or_empty(header::DISPOSITION_NOTIFICATION_OPTIONS),
        )?;
        mdn.is_signed_reply = !is_blank(&options.protocol);
        mdn.signed_receipt_mic_algorithm = options.mic_algorithm;
    }

    Ok(mdn)
}

/// The `multipart/report` entity carrying `mdn`.
pub fn mdn_entity(mdn: &ReplyMdn) -> MimeEntity {
    let text = MimeEntity::from_content("text/plain; charset=us-ascii", mdn.body_text.clone())
        .with_header(header::CONTENT_TRANSFER_ENCODING, "7bit");

    let attributes = &mdn.attributes;
    let mut fields = String::new();
    for (name, value) in [
        (field::REPORTING_UA, &attributes.reporting_ua),
        (field::ORIGINAL_RECIPIENT, &attributes.original_recipient),
        (field::FINAL_RECIPIENT, &attributes.final_recipient),
        (field::ORIGINAL_MESSAGE_ID, &attributes.original_message_id),
        (field::DISPOSITION, &attributes.content_disposition),
        (field::RECEIVED_CONTENT_MIC, &attributes.received_content_mic),
    ] {
        if is_blank(value) {
            continue;
        }
        fields.push_str(name);
        fields.push_str(": ");
        fields.push_str(value);
        fields.push_str("\r\n");
    }
    let notification = MimeEntity::from_content(DISPOSITION_NOTIFICATION_TYPE, fields)
        .with_header(header::CONTENT_TRANSFER_ENCODING, "7bit");

    MimeEntity::multipart(
        &format!("{}; report-type=disposition-notification", REPORT_TYPE),
        &[text, notification],
    )
}

/// [`mdn_entity`], signed with the company identity when the partner asked for a
/// signed receipt. Signing failures fall back to the unsigned MDN.
pub fn signed_mdn_entity(certs: &dyn CertificateStore, mdn: &ReplyMdn) -> MimeEntity {
    let entity = mdn_entity(mdn);
    if !mdn.is_signed_reply {
        return entity;
    }

    let signed = certs.certificate(&mdn.company_id).and_then(|cert| {
        let key = certs.private_key(&mdn.company_id)?;
        sign(
            &entity,
            &cert,
            &key,
            DigestAlgorithm::from_alias(&mdn.signed_receipt_mic_algorithm),
        )
    });

    match signed {
        Ok(signed) => signed,
        Err(e) => {
            tracing::error!(
                error = %e,
                company = %mdn.company_id,
                message_id = %mdn.attributes.original_message_id,
                "Error signing MDN for received file, sending unsigned"
            );
            entity
        }
    }
}

/// HTTP 200 carrying the MDN on the same connection.
pub fn mdn_response(certs: &dyn CertificateStore, mdn: &ReplyMdn) -> As2Response {
    let entity = signed_mdn_entity(certs, mdn);
    let mut headers = mdn.response_headers.clone();
    headers.insert(header::CONTENT_TYPE, entity.content_type());
    As2Response {
        status: 200,
        headers,
        body: entity.body().clone(),
    }
}
