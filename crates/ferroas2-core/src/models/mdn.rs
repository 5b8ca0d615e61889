//! MDN records: the one we reply with, the ones partners send us, and the
//! bookkeeping for sends still waiting on an async receipt.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::headers::Headers;
use crate::models::message::{ConnectionInfo, IncomingMessage, MdnMode};

/// Header-style fields of the `message/disposition-notification` part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdnAttributes {
    pub reporting_ua: String,
    pub original_recipient: String,
    pub final_recipient: String,
    pub original_message_id: String,
    /// Raw `Disposition` value.
    pub content_disposition: String,
    pub received_content_mic: String,
}

/// The MDN we send back for a file we received, on the same connection or async.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMdn {
    pub mdn_mode: MdnMode,
    pub async_reply_to_url: String,
    pub is_signed_reply: bool,
    pub signed_receipt_mic_algorithm: String,
    pub body_text: String,
    pub response_headers: Headers,
    pub attributes: MdnAttributes,
    pub partner_id: String,
    pub company_id: String,
}

/// MDN returned on the connection a file was sent on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingSyncMdn {
    pub body_text: String,
    pub attributes: MdnAttributes,
    /// Message-ID of the send this MDN answers.
    pub message_id: String,
    pub response_headers: Headers,
}

/// MDN delivered out of band on its own request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingAsyncMdn {
    pub body_text: String,
    pub attributes: MdnAttributes,
    pub sender_id: String,
    pub receiver_id: String,
    pub connection: ConnectionInfo,
    pub request_headers: Headers,
}

impl IncomingAsyncMdn {
    pub fn from_request(request: &IncomingMessage) -> Self {
        Self {
            sender_id: request.sender_id.clone(),
            receiver_id: request.receiver_id.clone(),
            connection: request.connection.clone(),
            request_headers: request.request_headers.clone(),
            ..Default::default()
        }
    }

    /// Identifier to log this MDN under.
    pub fn logging_text(&self) -> &str {
        if self.attributes.original_message_id.trim().is_empty() {
            "<no message-id found in attributes>"
        } else {
            &self.attributes.original_message_id
        }
    }
}

/// Result of processing an async MDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MdnReceiveStatus {
    Ok,
    MicNotMatched,
    NoContent,
    InvalidDisposition,
    ProcessingFailed,
    AsyncLoadError,
}

impl MdnReceiveStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            MdnReceiveStatus::Ok | MdnReceiveStatus::ProcessingFailed => 200,
            MdnReceiveStatus::MicNotMatched => 404,
            MdnReceiveStatus::NoContent | MdnReceiveStatus::InvalidDisposition => 400,
            MdnReceiveStatus::AsyncLoadError => 500,
        }
    }

    /// Body text returned to the partner that delivered the MDN.
    pub fn reply_text(&self) -> &'static str {
        match self {
            MdnReceiveStatus::Ok => "MDN Received Successfully",
            MdnReceiveStatus::MicNotMatched => "The MIC does not match",
            MdnReceiveStatus::NoContent => "No MDN entity found in request body",
            MdnReceiveStatus::InvalidDisposition => {
                "The POST did not contain a valid content-disposition for the MDN"
            }
            MdnReceiveStatus::ProcessingFailed => {
                "MDN Received, the partner reported a processing failure"
            }
            MdnReceiveStatus::AsyncLoadError => "Error loading pending MDN info",
        }
    }
}

/// Persisted record for a send awaiting an async MDN. Stored under the message id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMdnInfoFile {
    pub original_file: PathBuf,
    pub pending_file: PathBuf,
    pub outgoing_mic: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(MdnReceiveStatus::Ok.http_status(), 200);
        assert_eq!(MdnReceiveStatus::MicNotMatched.http_status(), 404);
        assert_eq!(MdnReceiveStatus::NoContent.http_status(), 400);
        assert_eq!(MdnReceiveStatus::InvalidDisposition.http_status(), 400);
        assert_eq!(MdnReceiveStatus::ProcessingFailed.http_status(), 200);
        assert_eq!(MdnReceiveStatus::AsyncLoadError.http_status(), 500);
        assert_eq!(MdnReceiveStatus::Ok.reply_text(), "MDN Received Successfully");
    }

    #[test]
    fn test_async_mdn_logging_text() {
        let mut mdn = IncomingAsyncMdn::default();
        assert_eq!(mdn.logging_text(), "<no message-id found in attributes>");
        mdn.attributes.original_message_id = "<m1@partner>".into();
        assert_eq!(mdn.logging_text(), "<m1@partner>");
    }

    #[test]
    fn test_pending_info_json_shape() {
        let info = PendingMdnInfoFile {
            original_file: PathBuf::from("/out/a.edi"),
            pending_file: PathBuf::from("/pending/a.edi"),
            outgoing_mic: "abc=, sha1".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["originalFile"], "/out/a.edi");
        assert_eq!(json["pendingFile"], "/pending/a.edi");
        assert_eq!(json["outgoingMic"], "abc=, sha1");
    }
}
