//! Storage abstraction trait

use std::path::PathBuf;

use async_trait::async_trait;
use ferroas2_core::models::{
    IncomingAsyncMdn, IncomingFileMessage, IncomingSyncMdn, OutgoingFileMessage,
    PendingMdnInfoFile, ReplyMdn,
};
use ferroas2_core::As2Error;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for As2Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::IoError(e) => As2Error::Io(e),
            other => As2Error::Storage(other.to_string()),
        }
    }
}

/// Durable store used by the send and receive pipelines.
///
/// A save that has returned is visible to every later load. Implementations
/// serialise operations internally, so callers treat each call as atomic.
#[async_trait]
pub trait As2Store: Send + Sync {
    /// Persist a received file; returns where it was written.
    async fn save_incoming_file(
        &self,
        msg: &IncomingFileMessage,
        data: &[u8],
    ) -> StorageResult<PathBuf>;

    /// Persist an MDN we replied with.
    async fn save_reply_mdn(&self, mdn: &ReplyMdn) -> StorageResult<PathBuf>;

    /// Persist an MDN returned on the connection a file was sent on.
    async fn save_sync_mdn(&self, mdn: &IncomingSyncMdn) -> StorageResult<PathBuf>;

    /// Persist an MDN delivered asynchronously.
    async fn save_async_mdn(&self, mdn: &IncomingAsyncMdn) -> StorageResult<PathBuf>;

    /// Record a send that waits on an async MDN and spool its file. Fills
    /// `msg.pending_info` and sets `msg.status` to `pending`.
    async fn save_pending_mdn(&self, msg: &mut OutgoingFileMessage) -> StorageResult<()>;

    /// Returns [`StorageError::NotFound`] when no record exists for `message_id`.
    async fn load_pending_mdn(&self, message_id: &str) -> StorageResult<PendingMdnInfoFile>;

    /// Remove the pending record and its spooled file.
    async fn delete_pending_mdn(&self, message_id: &str) -> StorageResult<()>;

    /// Move an acknowledged outbound file out of the outbox.
    async fn archive_sent_file(&self, msg: &OutgoingFileMessage) -> StorageResult<PathBuf>;
}
