//! Translation between axum requests and the engine's transport-neutral types.

pub mod file_receive;
pub mod mdn_receive;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use ferroas2_core::Headers;
use ferroas2_engine::{As2Response, InboundRequest};

/// Address a listener is bound to, attached to each request it accepts.
#[derive(Clone, Copy, Debug)]
pub struct LocalAddr(pub SocketAddr);

pub(crate) async fn to_inbound(request: Request, limit: usize) -> Result<InboundRequest, Response> {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit, "Failed to read request body");
            return Err((StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response());
        }
    };

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect::<Headers>();

    Ok(InboundRequest {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers,
        body,
        peer: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0),
        local: parts.extensions.get::<LocalAddr>().map(|addr| addr.0),
    })
}

pub(crate) fn into_response(response: As2Response) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in response.headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping response header that is not valid HTTP"),
        }
    }
    out
}
