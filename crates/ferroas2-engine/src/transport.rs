//! Transport-neutral request and response types.

use std::net::SocketAddr;

use bytes::Bytes;
use ferroas2_core::constants::header;
use ferroas2_core::models::{ConnectionInfo, IncomingMessage};
use ferroas2_core::{As2Error, ErrorMetadata, Headers};

/// A decoded HTTP request as delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub uri: String,
    pub headers: Headers,
    pub body: Bytes,
    pub peer: Option<SocketAddr>,
    pub local: Option<SocketAddr>,
}

impl InboundRequest {
    pub fn connection_info(&self) -> ConnectionInfo {
        let (source_ip, source_port) = split_addr(self.peer);
        let (destination_ip, destination_port) = split_addr(self.local);
        ConnectionInfo {
            source_ip,
            source_port,
            destination_ip,
            destination_port,
            request_method: self.method.clone(),
            request_uri: self.uri.clone(),
        }
    }

    pub fn to_incoming_message(&self) -> IncomingMessage {
        IncomingMessage::new(self.headers.clone(), self.connection_info())
    }

    pub fn is_post(&self) -> bool {
        self.method.eq_ignore_ascii_case("POST")
    }
}

fn split_addr(addr: Option<SocketAddr>) -> (String, u16) {
    match addr {
        Some(addr) => (addr.ip().to_string(), addr.port()),
        None => (String::new(), 0),
    }
}

/// Status, headers and body to send back to the partner.
#[derive(Debug, Clone)]
pub struct As2Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Default for As2Response {
    fn default() -> Self {
        Self::empty(200)
    }
}

impl As2Response {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert(header::CONTENT_TYPE, "text/plain; charset=utf-8");
        Self {
            status,
            headers,
            body: Bytes::from(text.into()),
        }
    }

    /// Plain-text rejection with the status code the error maps to.
    pub fn from_error(error: &As2Error) -> Self {
        Self::text(error.http_status_code(), error.to_string())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
