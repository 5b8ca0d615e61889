//! Async MDNs: receiving receipts for files we sent, and sending receipts for files
//! we received.

pub mod processor;
pub mod receiver;
pub mod sender;

pub use processor::AsyncMdnProcessor;
pub use receiver::AsyncMdnReceiver;
pub use sender::AsyncMdnSender;
