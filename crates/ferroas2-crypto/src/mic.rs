//! Message integrity check
//!
//! A MIC is `base64(digest), <algorithm>` with the algorithm echoed as requested.
//! Signed or encrypted content is digested with its MIME headers, plain content
//! without them; sender and receiver apply the same rule.

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use openssl::hash::hash;

use crate::algorithm::DigestAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::mime::MimeEntity;

/// Bytes the MIC is computed over.
pub fn mic_input(entity: &MimeEntity, include_headers: bool) -> Bytes {
    if include_headers {
        entity.to_bytes()
    } else {
        entity.body().clone()
    }
}

pub fn compute_mic(data: &[u8], algorithm: &str) -> CryptoResult<String> {
    let digest = DigestAlgorithm::parse(algorithm)
        .ok_or_else(|| CryptoError::UnsupportedAlgorithm(algorithm.to_string()))?;
    let digested = hash(digest.message_digest(), data)?;
    Ok(format!(
        "{}, {}",
        general_purpose::STANDARD.encode(digested),
        algorithm.trim()
    ))
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Compare the MIC we sent with the one a partner returned. Whitespace is ignored;
/// the digest must match exactly, the algorithm name case-insensitively.
pub fn validate_returned_mic(expected: &str, returned: &str) -> bool {
    let expected = strip_whitespace(expected);
    let returned = strip_whitespace(returned);
    if expected.is_empty() || returned.is_empty() {
        return false;
    }

    match (expected.split_once(','), returned.split_once(',')) {
        (Some((digest_a, alg_a)), Some((digest_b, alg_b))) => {
            digest_a == digest_b && alg_a.eq_ignore_ascii_case(alg_b)
        }
        _ => expected == returned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_mic_format() {
        // sha1("abc")
        let mic = compute_mic(b"abc", "SHA1").unwrap();
        assert_eq!(mic, "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=, SHA1");

        let mic = compute_mic(b"abc", "sha-256").unwrap();
        assert_eq!(mic, "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=, sha-256");
    }

    #[test]
    fn test_compute_mic_rejects_unknown_algorithm() {
        assert!(matches!(
            compute_mic(b"abc", "crc32"),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_validate_returned_mic() {
        assert!(validate_returned_mic("abc123, SHA1", "abc123,SHA1"));
        assert!(validate_returned_mic(" abc123 ,\tsha1\r\n", "abc123, SHA1"));
        assert!(!validate_returned_mic("abc123,SHA1", "xyz999,SHA1"));
        assert!(!validate_returned_mic("ABC123,SHA1", "abc123,SHA1"));
        assert!(!validate_returned_mic("abc123,SHA1", "abc123,MD5"));
        assert!(!validate_returned_mic("", ""));
    }

    #[test]
    fn test_mic_input_scope() {
        let entity = MimeEntity::from_content("text/plain", "hello");
        assert_eq!(mic_input(&entity, false).as_ref(), b"hello");
        assert_eq!(
            mic_input(&entity, true).as_ref(),
            b"Content-Type: text/plain\r\n\r\nhello"
        );
    }
}
