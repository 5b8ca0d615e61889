//! The dedicated async MDN endpoint.

use std::sync::Arc;

use ferroas2_core::constants::header;
use ferroas2_core::validation::is_blank;
use ferroas2_core::{log_error, As2Error};
use ferroas2_crypto::{is_signed, verify_and_unwrap, MimeEntity};

use super::processor::AsyncMdnProcessor;
use crate::mdn::is_mdn;
use crate::services::As2Services;
use crate::transport::{As2Response, InboundRequest};

const NOT_AN_MDN: &str = "Mime body part was not recognized as an MDN";

#[derive(Clone)]
pub struct AsyncMdnReceiver {
    services: Arc<As2Services>,
    processor: AsyncMdnProcessor,
}

impl AsyncMdnReceiver {
    pub fn new(services: Arc<As2Services>) -> Self {
        Self {
            processor: AsyncMdnProcessor::new(services.clone()),
            services,
        }
    }

    fn validate(request: &InboundRequest) -> Result<(), As2Error> {
        if !request.is_post() {
            return Err(As2Error::MethodNotAllowed(request.method.clone()));
        }
        for name in [header::AS2_FROM, header::AS2_TO] {
            if is_blank(request.headers.get_or_empty(name)) {
                return Err(As2Error::Protocol(format!(
                    "The required '{}' header was not present",
                    name
                )));
            }
        }
        if request.body.is_empty() {
            return Err(As2Error::Protocol(
                "The request did not contain an entity".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, size_bytes = request.body.len()))]
    pub async fn receive(&self, request: InboundRequest) -> As2Response {
        if let Err(e) = Self::validate(&request) {
            log_error(&e, "Invalid async MDN request");
            return As2Response::from_error(&e);
        }

        let message = request.to_incoming_message();
        let mut content = MimeEntity::from_content(
            request.headers.get_or_empty(header::CONTENT_TYPE),
            request.body.clone(),
        );

        if is_signed(&content) {
            let verified = self
                .services
                .certs
                .certificate(&message.sender_id)
                .and_then(|cert| verify_and_unwrap(&content, &cert));
            content = match verified {
                Ok(inner) => inner,
                Err(e) => {
                    let e = As2Error::from(e);
                    log_error(&e, "Async MDN signature rejected");
                    return As2Response::from_error(&e);
                }
            };
        }

        if !is_mdn(&content) {
            tracing::error!(content_type = %content.content_type(), "Mime body part was not valid or not an MDN");
            return As2Response::text(400, NOT_AN_MDN);
        }

        let response = self.processor.respond(&message, &content).await;
        tracing::debug!(status = response.status, "MDN receipt finished");
        response
    }
}
