//! Protocol and product constants.

pub const APP_NAME: &str = "Ferroas2";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifies this server in `User-Agent`, `Server` and `Reporting-UA` values.
pub const AS2_SERVER_SENDER_NAME: &str = concat!("Ferroas2Server/", env!("CARGO_PKG_VERSION"));

pub const AS2_PROTOCOL_VERSION: &str = "1.1";
pub const MIME_VERSION: &str = "1.0";

/// Tag at the start of every generated Message-ID.
pub const MESSAGE_ID_TAG: &str = "FERROAS2";

pub const DEFAULT_CONTENT_TYPE: &str = "application/EDIFACT";
pub const DEFAULT_TRANSFER_ENCODING: &str = "binary";
pub const DEFAULT_MDN_OPTIONS: &str =
    "signed-receipt-protocol=optional,pkcs7-signature; signed-receipt-micalg=optional,sha1";

/// Status codes a partner may answer with for a POST to count as delivered.
pub const VALID_RESPONSE_CODES: [u16; 5] = [200, 201, 202, 204, 206];

pub fn is_valid_response_code(code: u16) -> bool {
    VALID_RESPONSE_CODES.contains(&code)
}

/// Header names used on the wire.
pub mod header {
    pub const AS2_FROM: &str = "AS2-From";
    pub const AS2_TO: &str = "AS2-To";
    pub const AS2_VERSION: &str = "AS2-Version";
    pub const MESSAGE_ID: &str = "Message-ID";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
    pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
    pub const DISPOSITION_NOTIFICATION_TO: &str = "Disposition-Notification-To";
    pub const DISPOSITION_NOTIFICATION_OPTIONS: &str = "Disposition-Notification-Options";
    pub const RECEIPT_DELIVERY_OPTION: &str = "Receipt-Delivery-Option";
    pub const MIME_VERSION: &str = "Mime-Version";
}
