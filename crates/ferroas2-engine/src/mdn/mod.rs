//! MDN construction and parsing.

pub mod builder;
pub mod parser;

pub use builder::{build_reply_mdn, mdn_entity, mdn_response, signed_mdn_entity, success_text};
pub use parser::{is_mdn, parse_mdn, ParsedMdn};

pub(crate) const REPORT_TYPE: &str = "multipart/report";
pub(crate) const DISPOSITION_NOTIFICATION_TYPE: &str = "message/disposition-notification";

pub(crate) mod field {
    pub const REPORTING_UA: &str = "Reporting-UA";
    pub const ORIGINAL_RECIPIENT: &str = "Original-Recipient";
    pub const FINAL_RECIPIENT: &str = "Final-Recipient";
    pub const ORIGINAL_MESSAGE_ID: &str = "Original-Message-ID";
    pub const DISPOSITION: &str = "Disposition";
    pub const RECEIVED_CONTENT_MIC: &str = "Received-Content-MIC";
}
