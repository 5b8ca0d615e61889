//! Disposition grammar
//!
//! Parses, formats and validates the two small header grammars MDNs depend on:
//!
//! - `Disposition`: `<action-mode>/<sending-mode>; <type>[/<modifier>[:<description>]]`
//! - `Disposition-Notification-Options`:
//!   `signed-receipt-protocol=<importance>,<protocol>; signed-receipt-micalg=<importance>,<algorithm>`
//!
//! Both are tokenised positionally, so a value produced by [`DispositionType`]'s
//! `Display` impl parses back into the same fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::As2Error;

pub const AUTOMATIC_ACTION: &str = "automatic-action";
pub const MDN_SENT_AUTOMATICALLY: &str = "mdn-sent-automatically";

pub const TYPE_PROCESSED: &str = "processed";
pub const TYPE_FAILED: &str = "failed";

pub const MODIFIER_ERROR: &str = "error";
pub const MODIFIER_WARNING: &str = "warning";
pub const MODIFIER_FAILURE: &str = "failure";

pub const ERR_AUTHENTICATION: &str = "authentication-failed";
pub const ERR_DECOMPRESSION: &str = "decompression-failed";
pub const ERR_DECRYPTION: &str = "decryption-failed";
pub const ERR_INTEGRITY_CHECK: &str = "integrity-check-failed";
pub const ERR_UNEXPECTED: &str = "unexpected-processing-error";
pub const ERR_INSUFFICIENT_SECURITY: &str = "insufficient-message-security";

/// The closed set of descriptions allowed after a `processed/error` modifier.
pub const ERROR_CODES: [&str; 6] = [
    ERR_AUTHENTICATION,
    ERR_DECOMPRESSION,
    ERR_DECRYPTION,
    ERR_INTEGRITY_CHECK,
    ERR_UNEXPECTED,
    ERR_INSUFFICIENT_SECURITY,
];

fn tokenize(value: &str, delimiters: &[char]) -> Vec<String> {
    value
        .split(|c| delimiters.contains(&c))
        .filter(|t| !t.is_empty())
        .map(|t| t.trim().to_string())
        .collect()
}

/// Like [`tokenize`], but stops after `count` tokens and returns the untouched rest.
fn leading_tokens<'a>(
    value: &'a str,
    delimiters: &[char],
    count: usize,
) -> (Vec<String>, &'a str) {
    let mut tokens = Vec::with_capacity(count);
    let mut rest = value;
    while tokens.len() < count && !rest.is_empty() {
        match rest.find(|c: char| delimiters.contains(&c)) {
            Some(end) => {
                if end > 0 {
                    tokens.push(rest[..end].trim().to_string());
                }
                rest = &rest[end + 1..];
            }
            None => {
                tokens.push(rest.trim().to_string());
                rest = "";
            }
        }
    }
    (tokens, rest)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispositionType {
    pub action_mode: String,
    pub sending_mode: String,
    pub disposition_type: String,
    pub disposition_modifier: String,
    pub disposition_description: String,
}

impl DispositionType {
    fn automatic(disposition_type: &str, modifier: &str, description: &str) -> Self {
        Self {
            action_mode: AUTOMATIC_ACTION.to_string(),
            sending_mode: MDN_SENT_AUTOMATICALLY.to_string(),
            disposition_type: disposition_type.to_string(),
            disposition_modifier: modifier.to_string(),
            disposition_description: description.to_string(),
        }
    }

    /// `automatic-action/mdn-sent-automatically; processed`
    pub fn success() -> Self {
        Self::automatic(TYPE_PROCESSED, "", "")
    }

    /// `processed/error:<code>`; `code` should be one of [`ERROR_CODES`].
    pub fn error(code: &str) -> Self {
        Self::automatic(TYPE_PROCESSED, MODIFIER_ERROR, code)
    }

    pub fn warning(description: &str) -> Self {
        Self::automatic(TYPE_PROCESSED, MODIFIER_WARNING, description)
    }

    pub fn failure(description: &str) -> Self {
        Self::automatic(TYPE_FAILED, MODIFIER_FAILURE, description)
    }

    /// Parse a `Disposition` header value. Never fails: missing fields are left empty
    /// and [`is_format_valid`](Self::is_format_valid) reports whether the result is usable.
    ///
    /// Everything after the modifier's `:` is the description, delimiters included.
    /// All fields come back lowercased.
    pub fn parse(value: &str) -> Self {
        let (fields, description) = leading_tokens(value, &['/', ';', ':'], 4);
        let mut fields = fields.into_iter().map(|t| t.to_lowercase());

        let mut next = || fields.next().unwrap_or_default();
        Self {
            action_mode: next(),
            sending_mode: next(),
            disposition_type: next(),
            disposition_modifier: next(),
            disposition_description: description.trim().to_lowercase(),
        }
    }

    pub fn is_format_valid(&self) -> bool {
        if !self.action_mode.eq_ignore_ascii_case(AUTOMATIC_ACTION) {
            return false;
        }

        if self.disposition_type.eq_ignore_ascii_case(TYPE_FAILED) {
            return true;
        }
        if !self.disposition_type.eq_ignore_ascii_case(TYPE_PROCESSED) {
            return false;
        }

        if is_blank(&self.disposition_modifier) {
            return true;
        }

        let modifier = self.disposition_modifier.to_lowercase();
        match modifier.as_str() {
            MODIFIER_ERROR => ERROR_CODES
                .iter()
                .any(|code| code.eq_ignore_ascii_case(self.disposition_description.trim())),
            MODIFIER_WARNING | MODIFIER_FAILURE => !is_blank(&self.disposition_description),
            _ => false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.disposition_type.eq_ignore_ascii_case(TYPE_PROCESSED)
            && is_blank(&self.disposition_modifier)
    }

    pub fn is_warning(&self) -> bool {
        self.disposition_modifier.eq_ignore_ascii_case(MODIFIER_WARNING)
    }
}

impl fmt::Display for DispositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}; {}",
            self.action_mode, self.sending_mode, self.disposition_type
        )?;
        if !is_blank(&self.disposition_modifier) {
            write!(
                f,
                "/{}:{}",
                self.disposition_modifier, self.disposition_description
            )?;
        }
        Ok(())
    }
}

/// Parsed `Disposition-Notification-Options` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispositionOptions {
    pub protocol_importance: String,
    pub protocol: String,
    pub mic_algorithm_importance: String,
    pub mic_algorithm: String,
}

impl DispositionOptions {
    pub fn parse(value: &str) -> Result<Self, As2Error> {
        let tokens = tokenize(value, &['=', ',', ';']);
        if tokens.len() < 6 {
            return Err(As2Error::InvalidFormat(format!(
                "Invalid disposition options format: {}",
                value
            )));
        }

        Ok(Self {
            protocol_importance: tokens[1].clone(),
            protocol: tokens[2].clone(),
            mic_algorithm_importance: tokens[4].clone(),
            mic_algorithm: tokens[5].clone(),
        })
    }
}

impl fmt::Display for DispositionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signed-receipt-protocol={},{}; signed-receipt-micalg={},{}",
            self.protocol_importance,
            self.protocol,
            self.mic_algorithm_importance,
            self.mic_algorithm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let d = DispositionType::parse("AutoMatic-Action/MDN-sent-automatically; processed");
        assert_eq!(d.action_mode, "automatic-action");
        assert_eq!(d.sending_mode, "mdn-sent-automatically");
        assert_eq!(d.disposition_type, "processed");
        assert_eq!(d.disposition_modifier, "");
        assert!(d.is_success());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let d = DispositionType::parse("automatic-action / MDN-sent-automatically;    processed");
        assert_eq!(
            d.to_string(),
            "automatic-action/mdn-sent-automatically; processed"
        );
    }

    #[test]
    fn test_error_renders_exact_wire_format() {
        let d = DispositionType::error(ERR_INTEGRITY_CHECK);
        assert_eq!(
            d.to_string(),
            "automatic-action/mdn-sent-automatically; processed/error:integrity-check-failed"
        );
    }

    #[test]
    fn test_constructors_round_trip() {
        let all = vec![
            DispositionType::success(),
            DispositionType::error(ERR_DECRYPTION),
            DispositionType::error(ERR_UNEXPECTED),
            DispositionType::warning("duplicate document"),
            DispositionType::failure("unsupported format"),
        ];

        for d in all {
            assert!(d.is_format_valid(), "{} should be valid", d);
            assert_eq!(DispositionType::parse(&d.to_string()), d);
        }
    }

    #[test]
    fn test_description_keeps_delimiters() {
        let d = DispositionType::warning("see: section 4/2; retry later");
        let parsed = DispositionType::parse(&d.to_string());
        assert_eq!(parsed.disposition_modifier, "warning");
        assert_eq!(parsed.disposition_description, "see: section 4/2; retry later");
        assert_eq!(parsed, d);

        let d = DispositionType::parse(
            "automatic-action/mdn-sent-automatically; failed/failure: Unsupported: x12/005010",
        );
        assert_eq!(d.disposition_description, "unsupported: x12/005010");
    }

    #[test]
    fn test_warning_is_not_success() {
        let d = DispositionType::warning("duplicate document");
        assert!(d.is_warning());
        assert!(!d.is_success());
    }

    #[test]
    fn test_format_validation() {
        // unknown error code
        assert!(!DispositionType::parse(
            "automatic-action/mdn-sent-automatically; processed/error:bad-code"
        )
        .is_format_valid());
        // warning without a description
        assert!(!DispositionType::parse(
            "automatic-action/mdn-sent-automatically; processed/warning"
        )
        .is_format_valid());
        // unknown modifier
        assert!(!DispositionType::parse(
            "automatic-action/mdn-sent-automatically; processed/other:x"
        )
        .is_format_valid());
        // manual action mode
        assert!(!DispositionType::parse("manual-action/mdn-sent-manually; processed")
            .is_format_valid());
        // unknown type
        assert!(!DispositionType::parse("automatic-action/mdn-sent-automatically; deleted")
            .is_format_valid());
        // failed is always well formed
        assert!(DispositionType::parse("automatic-action/mdn-sent-automatically; failed")
            .is_format_valid());
        // error codes compare case-insensitively
        assert!(DispositionType::parse(
            "Automatic-Action/MDN-Sent-Automatically; Processed/Error: Decryption-Failed"
        )
        .is_format_valid());
    }

    #[test]
    fn test_parse_empty_value() {
        let d = DispositionType::parse("");
        assert_eq!(d, DispositionType::default());
        assert!(!d.is_format_valid());
        assert!(!d.is_success());
    }

    #[test]
    fn test_options_parse() {
        let opts = DispositionOptions::parse(
            "signed-receipt-protocol=optional,pkcs7-signature; signed-receipt-micalg=optional,sha1",
        )
        .unwrap();
        assert_eq!(opts.protocol_importance, "optional");
        assert_eq!(opts.protocol, "pkcs7-signature");
        assert_eq!(opts.mic_algorithm_importance, "optional");
        assert_eq!(opts.mic_algorithm, "sha1");
    }

    #[test]
    fn test_options_with_several_algorithms_takes_first() {
        let opts = DispositionOptions::parse(
            "signed-receipt-protocol=required, pkcs7-signature; signed-receipt-micalg=required, sha-256, sha1",
        )
        .unwrap();
        assert_eq!(opts.protocol, "pkcs7-signature");
        assert_eq!(opts.mic_algorithm, "sha-256");
    }

    #[test]
    fn test_options_too_few_tokens() {
        let err = DispositionOptions::parse("signed-receipt-protocol=optional,pkcs7-signature")
            .unwrap_err();
        assert!(matches!(err, As2Error::InvalidFormat(_)));
        assert!(err.to_string().contains("Invalid disposition options format"));

        assert!(DispositionOptions::parse("").is_err());
        assert!(DispositionOptions::parse("a=b,c; d=e").is_err());
    }

    #[test]
    fn test_options_display_parses_back() {
        let opts = DispositionOptions::parse(
            "signed-receipt-protocol=optional,pkcs7-signature; signed-receipt-micalg=optional,sha1",
        )
        .unwrap();
        assert_eq!(
            opts.to_string(),
            "signed-receipt-protocol=optional,pkcs7-signature; signed-receipt-micalg=optional,sha1"
        );
        assert_eq!(DispositionOptions::parse(&opts.to_string()).unwrap(), opts);
    }
}
