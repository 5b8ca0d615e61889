//! Reading MDNs sent by partners.

use ferroas2_core::models::MdnAttributes;
use ferroas2_core::{As2Error, As2Result, Headers};
use ferroas2_crypto::MimeEntity;

use super::{field, DISPOSITION_NOTIFICATION_TYPE, REPORT_TYPE};

/// Fields and explanatory text of a `multipart/report` MDN.
#[derive(Debug, Clone, Default)]
pub struct ParsedMdn {
    pub attributes: MdnAttributes,
    pub body_text: String,
}

pub fn is_mdn(entity: &MimeEntity) -> bool {
    entity.is_mime_type(REPORT_TYPE)
}

/// Parse a `multipart/report` entity. `Ok(None)` when the report carries no
/// `message/disposition-notification` part.
pub fn parse_mdn(entity: &MimeEntity) -> As2Result<Option<ParsedMdn>> {
    if !is_mdn(entity) {
        return Err(As2Error::Mime(format!(
            "expected {}, got '{}'",
            REPORT_TYPE,
            entity.content_type()
        )));
    }

    let mut parsed = ParsedMdn::default();
    let mut found = false;

    for part in entity.parts()? {
        if part.is_mime_type("text/plain") {
            let text = part.decoded_body()?;
            parsed.body_text = String::from_utf8_lossy(&text).into_owned();
        } else if part.is_mime_type(DISPOSITION_NOTIFICATION_TYPE) {
            let body = part.decoded_body()?;
            let mut fields = parse_fields(&String::from_utf8_lossy(&body));
            // some implementations put the fields on the part itself
            if fields.get(field::DISPOSITION).is_none() {
                fields = part.headers().clone();
            }
            parsed.attributes = attributes_from(&fields);
            found = true;
        }
    }

    Ok(found.then_some(parsed))
}

fn attributes_from(fields: &Headers) -> MdnAttributes {
    let value = |name: &str| fields.get_or_empty(name).trim().to_string();
    MdnAttributes {
        reporting_ua: value(field::REPORTING_UA),
        original_recipient: value(field::ORIGINAL_RECIPIENT),
        final_recipient: value(field::FINAL_RECIPIENT),
        original_message_id: value(field::ORIGINAL_MESSAGE_ID),
        content_disposition: value(field::DISPOSITION),
        received_content_mic: value(field::RECEIVED_CONTENT_MIC),
    }
}

/// Header-style `Name: value` lines, with folded continuation lines joined.
fn parse_fields(text: &str) -> Headers {
    let mut fields = Headers::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = current.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = current.take() {
            fields.append(name, value);
        }
        if let Some((name, value)) = line.split_once(':') {
            current = Some((name.trim().to_string(), value.trim().to_string()));
        }
    }
    if let Some((name, value)) = current {
        fields.append(name, value);
    }
    fields
}
