//! Send dispatch trait
//!
//! The server implements this on top of the outbound pipeline. The scheduler calls
//! `send_file` for each due file and waits for it before picking the next one.

use anyhow::Result;
use async_trait::async_trait;

use ferroas2_core::models::WatchedFile;

#[async_trait]
pub trait SendDispatch: Send + Sync {
    /// Send one file to its partner. An error leaves the file for an explicit resend.
    async fn send_file(&self, file: &WatchedFile) -> Result<()>;
}
