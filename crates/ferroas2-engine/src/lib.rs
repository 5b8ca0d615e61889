//! Ferroas2 Engine
//!
//! The AS2 protocol engine: the outbound send pipeline, the inbound receive
//! pipeline, MDN construction and parsing, and async MDN handling in both
//! directions. Transport concerns stay outside; requests come in as
//! [`InboundRequest`] and leave as [`As2Response`], so the HTTP server crate only
//! translates between its framework types and these.

pub mod async_mdn;
pub(crate) mod events;
pub mod inbound;
pub mod mdn;
pub mod outbound;
pub mod services;
pub mod transport;

pub use async_mdn::{AsyncMdnProcessor, AsyncMdnReceiver, AsyncMdnSender};
pub use inbound::FileReceiver;
pub use outbound::FileSender;
pub use services::{As2Services, EngineSettings};
pub use transport::{As2Response, InboundRequest};
