//! Outgoing and incoming AS2 message records.

use std::path::PathBuf;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{header, MESSAGE_ID_TAG};
use crate::headers::Headers;

pub const STATUS_NEW: &str = "new";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_MIC_MISMATCH: &str = "mic-mismatch";

/// How the partner wants its receipt delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MdnMode {
    None,
    #[default]
    Standard,
    Async,
}

impl MdnMode {
    /// No MDN when neither `Disposition-Notification-To` nor `-Options` is set, async
    /// when a `Receipt-Delivery-Option` URL is given, same-connection otherwise.
    pub fn from_request_headers(headers: &Headers) -> Self {
        if !headers.is_present(header::DISPOSITION_NOTIFICATION_OPTIONS)
            && !headers.is_present(header::DISPOSITION_NOTIFICATION_TO)
        {
            MdnMode::None
        } else if headers.is_present(header::RECEIPT_DELIVERY_OPTION) {
            MdnMode::Async
        } else {
            MdnMode::Standard
        }
    }
}

/// Endpoints of the connection a request arrived on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub source_ip: String,
    pub source_port: u16,
    pub destination_ip: String,
    pub destination_port: u16,
    pub request_method: String,
    pub request_uri: String,
}

/// Anything received over HTTP from a partner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub request_headers: Headers,
    pub connection: ConnectionInfo,
    pub sender_id: String,
    pub receiver_id: String,
}

impl IncomingMessage {
    pub fn new(request_headers: Headers, connection: ConnectionInfo) -> Self {
        let sender_id = request_headers.get_or_empty(header::AS2_FROM).trim().to_string();
        let receiver_id = request_headers.get_or_empty(header::AS2_TO).trim().to_string();
        Self {
            request_headers,
            connection,
            sender_id,
            receiver_id,
        }
    }
}

/// A request classified as a file transfer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingFileMessage {
    #[serde(flatten)]
    pub request: IncomingMessage,
    pub message_id: String,
    pub mdn_mode: MdnMode,
    pub file_name: String,
}

impl IncomingFileMessage {
    pub fn new(request: IncomingMessage) -> Self {
        let message_id = request
            .request_headers
            .get_or_empty(header::MESSAGE_ID)
            .trim()
            .to_string();
        let mdn_mode = MdnMode::from_request_headers(&request.request_headers);
        Self {
            file_name: message_id.clone(),
            message_id,
            mdn_mode,
            request,
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.request.sender_id
    }

    pub fn receiver_id(&self) -> &str {
        &self.request.receiver_id
    }
}

/// Locations of the spooled copy of a file awaiting an async MDN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInfo {
    pub data_file: Option<PathBuf>,
    pub info_file: Option<PathBuf>,
}

/// A file being sent to a partner. Owned by one outbound pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingFileMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub message_id: String,
    pub file_path: PathBuf,
    pub content_type: String,
    /// The outgoing `Disposition-Notification-Options` value; also selects the MIC algorithm.
    pub content_disposition: String,
    pub outgoing_mic: String,
    pub status: String,
    pub pending_info: PendingInfo,
}

impl OutgoingFileMessage {
    pub fn new(
        file_path: impl Into<PathBuf>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        let sender_id = sender_id.into();
        let receiver_id = receiver_id.into();
        Self {
            message_id: generate_message_id(&sender_id, &receiver_id),
            file_path: file_path.into(),
            sender_id,
            receiver_id,
            content_type: String::new(),
            content_disposition: String::new(),
            outgoing_mic: String::new(),
            status: STATUS_NEW.to_string(),
            pending_info: PendingInfo::default(),
        }
    }

    /// Last path component of the file being sent.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `<FERROAS2-sender-receiver-yyyy-MM-dd-HH-mm-ss-nnnnn>`
pub fn generate_message_id(sender_id: &str, receiver_id: &str) -> String {
    let suffix: u32 = rand::rng().random_range(0..100_000);
    format!(
        "<{}-{}-{}-{}-{:05}>",
        MESSAGE_ID_TAG,
        sender_id,
        receiver_id,
        Utc::now().format("%Y-%m-%d-%H-%M-%S"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_mdn_mode_from_headers() {
        assert_eq!(MdnMode::from_request_headers(&Headers::new()), MdnMode::None);
        assert_eq!(
            MdnMode::from_request_headers(&headers(&[(
                "Disposition-Notification-To",
                "edi@example.com"
            )])),
            MdnMode::Standard
        );
        assert_eq!(
            MdnMode::from_request_headers(&headers(&[
                ("Disposition-Notification-Options", "signed-receipt-protocol=optional,pkcs7-signature; signed-receipt-micalg=optional,sha1"),
                ("Receipt-Delivery-Option", "http://partner:4081"),
            ])),
            MdnMode::Async
        );
        // a blank delivery option does not make the request async
        assert_eq!(
            MdnMode::from_request_headers(&headers(&[
                ("Disposition-Notification-To", "edi@example.com"),
                ("Receipt-Delivery-Option", " "),
            ])),
            MdnMode::Standard
        );
    }

    #[test]
    fn test_incoming_file_message_from_headers() {
        let request = IncomingMessage::new(
            headers(&[
                ("AS2-From", " partnera "),
                ("AS2-To", "mycompany"),
                ("Message-ID", "<abc@partnera>"),
            ]),
            ConnectionInfo::default(),
        );
        let msg = IncomingFileMessage::new(request);
        assert_eq!(msg.sender_id(), "partnera");
        assert_eq!(msg.receiver_id(), "mycompany");
        assert_eq!(msg.message_id, "<abc@partnera>");
        assert_eq!(msg.file_name, "<abc@partnera>");
        assert_eq!(msg.mdn_mode, MdnMode::None);
    }

    #[test]
    fn test_outgoing_message_id_format() {
        let msg = OutgoingFileMessage::new("/data/outbox/partnera/order.edi", "mycompany", "partnera");
        assert!(msg.message_id.starts_with("<FERROAS2-mycompany-partnera-"));
        assert!(msg.message_id.ends_with('>'));
        assert_eq!(msg.status, STATUS_NEW);
        assert_eq!(msg.file_name(), "order.edi");

        let other = OutgoingFileMessage::new("/x", "mycompany", "partnera");
        // yyyy-MM-dd-HH-mm-ss-nnnnn
        let stamp = other
            .message_id
            .trim_start_matches("<FERROAS2-mycompany-partnera-")
            .trim_end_matches('>');
        assert_eq!(stamp.split('-').count(), 7);
    }
}
