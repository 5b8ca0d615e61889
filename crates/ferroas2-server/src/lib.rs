//! Ferroas2 Server Library
//!
//! HTTP listeners, the outbox scheduler wiring and application setup.

pub mod dispatch;
mod handlers;
pub mod setup;
pub mod state;

pub use dispatch::EngineDispatch;
pub use state::AppState;
