//! Byte-exact MIME entities
//!
//! Signatures and MICs are computed over serialised entities, so an entity parsed
//! from the wire keeps its original bytes and writes them back unchanged until one
//! of its headers is modified. Entities built locally serialise as
//! `Name: value\r\n` header lines, an empty line, then the body.

use base64::{engine::general_purpose, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use ferroas2_core::constants::header;
use ferroas2_core::Headers;

use crate::error::{CryptoError, CryptoResult};

pub const CRLF: &[u8] = b"\r\n";
const BASE64_LINE_LEN: usize = 76;

#[derive(Debug, Clone, Default)]
pub struct MimeEntity {
    headers: Headers,
    body: Bytes,
    raw: Option<Bytes>,
}

impl MimeEntity {
    pub fn new(headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
            raw: None,
        }
    }

    /// Entity whose only header travels out of band, e.g. an HTTP `Content-Type`
    /// with the request body as content.
    pub fn from_content(content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut headers = Headers::new();
        headers.insert(header::CONTENT_TYPE, content_type);
        Self::new(headers, body)
    }

    pub fn parse(data: impl Into<Bytes>) -> CryptoResult<Self> {
        let data = data.into();
        let (header_end, body_start) = find_header_end(&data)
            .ok_or_else(|| CryptoError::Mime("entity has no header/body separator".into()))?;
        let header_text = String::from_utf8_lossy(&data[..header_end]);
        let headers = parse_headers(&header_text)?;

        Ok(Self {
            headers,
            body: data.slice(body_start..),
            raw: Some(data),
        })
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name, value);
        self.raw = None;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> &str {
        self.headers.get_or_empty(header::CONTENT_TYPE)
    }

    /// Lower-cased `type/subtype` without parameters.
    pub fn mime_type(&self) -> String {
        self.content_type()
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }

    pub fn is_mime_type(&self, expected: &str) -> bool {
        self.mime_type().eq_ignore_ascii_case(expected)
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type().starts_with("multipart/")
    }

    pub fn content_type_param(&self, name: &str) -> Option<String> {
        header_param(self.content_type(), name)
    }

    /// The `filename` parameter of `Content-Disposition`.
    pub fn filename(&self) -> Option<String> {
        self.headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| header_param(value, "filename"))
            .filter(|name| !name.trim().is_empty())
    }

    /// Body with any base64 transfer encoding removed.
    pub fn decoded_body(&self) -> CryptoResult<Bytes> {
        let encoding = self
            .headers
            .get_or_empty(header::CONTENT_TRANSFER_ENCODING)
            .trim();
        if !encoding.eq_ignore_ascii_case("base64") {
            return Ok(self.body.clone());
        }

        let compact: Vec<u8> = self
            .body
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        general_purpose::STANDARD
            .decode(compact)
            .map(Bytes::from)
            .map_err(|e| CryptoError::Mime(format!("invalid base64 body: {}", e)))
    }

    pub fn to_bytes(&self) -> Bytes {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }

        let mut out = BytesMut::with_capacity(self.body.len() + 256);
        for (name, value) in self.headers.iter() {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(CRLF);
        }
        out.put_slice(CRLF);
        out.put_slice(&self.body);
        out.freeze()
    }

    /// Build a multipart entity. `content_type` carries every parameter except the
    /// boundary, which is generated.
    pub fn multipart(content_type: &str, parts: &[MimeEntity]) -> Self {
        let boundary = new_boundary();
        let mut body = BytesMut::new();
        for part in parts {
            body.put_slice(b"--");
            body.put_slice(boundary.as_bytes());
            body.put_slice(CRLF);
            body.put_slice(&part.to_bytes());
            body.put_slice(CRLF);
        }
        body.put_slice(b"--");
        body.put_slice(boundary.as_bytes());
        body.put_slice(b"--");
        body.put_slice(CRLF);

        Self::from_content(
            &format!("{}; boundary=\"{}\"", content_type, boundary),
            body.freeze(),
        )
    }

    /// Split a multipart body into its parts, each keeping its exact bytes.
    pub fn parts(&self) -> CryptoResult<Vec<MimeEntity>> {
        let boundary = self
            .content_type_param("boundary")
            .ok_or_else(|| CryptoError::Mime("multipart entity has no boundary".into()))?;
        let delimiter = format!("--{}", boundary).into_bytes();
        let body = &self.body;

        let mut cursor = find_delimiter(body, &delimiter, 0)
            .ok_or_else(|| CryptoError::Mime(format!("boundary {} not found", boundary)))?;
        let mut parts = Vec::new();

        loop {
            let after = cursor + delimiter.len();
            if body[after..].starts_with(b"--") {
                break;
            }
            let start = match find(body, b"\n", after) {
                Some(pos) => pos + 1,
                None => break,
            };
            let next = find_delimiter(body, &delimiter, start)
                .ok_or_else(|| CryptoError::Mime("unterminated multipart body".into()))?;

            // the line break before a delimiter belongs to the delimiter
            let mut end = next;
            if end > start && body[end - 1] == b'\n' {
                end -= 1;
                if end > start && body[end - 1] == b'\r' {
                    end -= 1;
                }
            }
            parts.push(MimeEntity::parse(body.slice(start..end))?);
            cursor = next;
        }

        Ok(parts)
    }
}

/// Base64 with CRLF line breaks every 76 characters.
pub fn encode_base64_lines(data: &[u8]) -> Bytes {
    let encoded = general_purpose::STANDARD.encode(data);
    let mut out = BytesMut::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LEN * 2 + 2);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        out.put_slice(chunk);
        out.put_slice(CRLF);
    }
    out.freeze()
}

/// Value of parameter `name` in a structured header such as
/// `multipart/signed; protocol="application/pkcs7-signature"; micalg=sha1`.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    split_params(value).into_iter().skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(unquote(val.trim()))
        } else {
            None
        }
    })
}

fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (idx, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].replace("\\\"", "\"")
    } else {
        value.to_string()
    }
}

fn new_boundary() -> String {
    format!("----=_Part_{}", uuid::Uuid::new_v4().simple())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(found) = find(body, delimiter, pos) {
        if found == 0 || body[found - 1] == b'\n' {
            return Some(found);
        }
        pos = found + 1;
    }
    None
}

/// Returns (end of header block, start of body).
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    if data.starts_with(CRLF) {
        return Some((0, 2));
    }
    if data.starts_with(b"\n") {
        return Some((0, 1));
    }
    let crlf = find(data, b"\r\n\r\n", 0).map(|p| (p, p + 4));
    let lf = find(data, b"\n\n", 0).map(|p| (p, p + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_headers(text: &str) -> CryptoResult<Headers> {
    let mut lines: Vec<(String, String)> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            match lines.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => {
                    return Err(CryptoError::Mime(format!(
                        "continuation line without a header: {}",
                        line.trim()
                    )))
                }
            }
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CryptoError::Mime(format!("malformed header line: {}", line)))?;
        lines.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(lines.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_raw_bytes() {
        let raw = b"Content-Type: application/EDIFACT\r\nContent-Disposition: Attachment; filename=\"order 1.edi\"\r\n\r\nUNB+UNOA:1'\r\n";
        let entity = MimeEntity::parse(Bytes::from_static(raw)).unwrap();

        assert_eq!(entity.mime_type(), "application/edifact");
        assert_eq!(entity.filename().as_deref(), Some("order 1.edi"));
        assert_eq!(entity.body().as_ref(), b"UNB+UNOA:1'\r\n");
        assert_eq!(entity.to_bytes().as_ref(), raw);
    }

    #[test]
    fn test_mutation_reserialises() {
        let raw = b"content-type:   text/plain\n\nhello";
        let mut entity = MimeEntity::parse(Bytes::from_static(raw)).unwrap();
        assert_eq!(entity.to_bytes().as_ref(), raw);

        entity.set_header("X-Test", "1");
        assert_eq!(
            entity.to_bytes().as_ref(),
            b"content-type: text/plain\r\nX-Test: 1\r\n\r\nhello"
        );
    }

    #[test]
    fn test_folded_headers_and_quoted_params() {
        let raw = b"Content-Type: multipart/signed;\r\n\tprotocol=\"application/pkcs7-signature\"; micalg=sha1;\r\n boundary=\"a;b\"\r\n\r\n";
        let entity = MimeEntity::parse(Bytes::from_static(raw)).unwrap();
        assert_eq!(entity.mime_type(), "multipart/signed");
        assert_eq!(
            entity.content_type_param("protocol").as_deref(),
            Some("application/pkcs7-signature")
        );
        assert_eq!(entity.content_type_param("MICALG").as_deref(), Some("sha1"));
        assert_eq!(entity.content_type_param("boundary").as_deref(), Some("a;b"));
        assert!(entity.content_type_param("charset").is_none());
    }

    #[test]
    fn test_entity_without_headers() {
        let entity = MimeEntity::parse(Bytes::from_static(b"\r\nbody only")).unwrap();
        assert!(entity.headers().is_empty());
        assert_eq!(entity.body().as_ref(), b"body only");
        assert!(MimeEntity::parse(Bytes::from_static(b"no separator")).is_err());
    }

    #[test]
    fn test_multipart_parts_are_byte_exact() {
        let first = MimeEntity::from_content("text/plain", "line one\r\nline two\r\n");
        let second = MimeEntity::from_content("application/octet-stream", vec![0u8, 1, 2, 255])
            .with_header("Content-Transfer-Encoding", "binary");
        let multipart = MimeEntity::multipart(
            "multipart/report; report-type=disposition-notification",
            &[first.clone(), second.clone()],
        );

        assert!(multipart.is_multipart());
        assert_eq!(
            multipart.content_type_param("report-type").as_deref(),
            Some("disposition-notification")
        );
        let boundary = multipart.content_type_param("boundary").unwrap();
        assert!(boundary.starts_with("----=_Part_"));

        let parts = multipart.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].to_bytes(), first.to_bytes());
        assert_eq!(parts[1].to_bytes(), second.to_bytes());
        assert_eq!(parts[1].body().as_ref(), &[0u8, 1, 2, 255]);
    }

    #[test]
    fn test_parses_foreign_multipart_with_preamble() {
        let body = "This is a multi-part message\r\n--XYZ\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ\r\nContent-Type: message/disposition-notification\r\n\r\nDisposition: automatic-action/MDN-sent-automatically; processed\r\n\r\n--XYZ--\r\n";
        let entity = MimeEntity::from_content(
            "multipart/report; report-type=disposition-notification; boundary=XYZ",
            body,
        );
        let parts = entity.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body().as_ref(), b"hello");
        assert!(parts[1].is_mime_type("message/disposition-notification"));
        assert_eq!(
            parts[1].body().as_ref(),
            b"Disposition: automatic-action/MDN-sent-automatically; processed\r\n"
        );
    }

    #[test]
    fn test_missing_boundary() {
        let entity = MimeEntity::from_content("multipart/mixed", "--x\r\n\r\n--x--");
        assert!(entity.parts().is_err());
    }

    #[test]
    fn test_base64_body_decodes() {
        let encoded = encode_base64_lines(&[7u8; 100]);
        assert!(encoded.windows(2).any(|w| w == CRLF));
        assert!(encoded
            .split(|b| *b == b'\n')
            .all(|line| line.len() <= BASE64_LINE_LEN + 1));

        let entity = MimeEntity::from_content("application/pkcs7-signature", encoded)
            .with_header("Content-Transfer-Encoding", "base64");
        assert_eq!(entity.decoded_body().unwrap().as_ref(), &[7u8; 100]);
    }
}
