//! Ferroas2 Infrastructure Library
//!
//! Shared infrastructure for the Ferroas2 binaries:
//! - Telemetry initialization
//! - Request ID middleware
//! - Event publishing to the log

pub mod events;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use events::TracingEventSink;
pub use middleware::{get_request_id, request_id_middleware, RequestId};
pub use telemetry::{init_telemetry, shutdown_telemetry};
