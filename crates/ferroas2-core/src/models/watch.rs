use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds a newly seen (or re-modified) file waits before it may be sent.
pub const DEBOUNCE_SECS: i64 = 15;

/// Minutes added per retry when a file is explicitly resent.
pub const RESEND_DELAY_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchStatus {
    New,
    Send,
    Resend,
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchStatus::New => "NEW",
            WatchStatus::Send => "SEND",
            WatchStatus::Resend => "RESEND",
        };
        f.write_str(s)
    }
}

/// A partner outbox: files dropped here go from `sender_id` to `receiver_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedDir {
    pub directory: PathBuf,
    pub sender_id: String,
    pub receiver_id: String,
}

impl WatchedDir {
    pub fn new(
        directory: impl Into<PathBuf>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
        }
    }
}

impl fmt::Display for WatchedDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{dir={}, sender={}, receiver={}}}",
            self.directory.display(),
            self.sender_id,
            self.receiver_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedFile {
    pub file: PathBuf,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: WatchStatus,
    pub retries: u32,
    pub send_at: DateTime<Utc>,
}

impl WatchedFile {
    pub fn new(file: impl Into<PathBuf>, dir: &WatchedDir) -> Self {
        Self {
            file: file.into(),
            sender_id: dir.sender_id.clone(),
            receiver_id: dir.receiver_id.clone(),
            status: WatchStatus::New,
            retries: 0,
            send_at: Utc::now() + Duration::seconds(DEBOUNCE_SECS),
        }
    }

    /// Push `send_at` out again while the file is still being written.
    pub fn debounce(&mut self, now: DateTime<Utc>) {
        self.send_at = now + Duration::seconds(DEBOUNCE_SECS);
    }

    /// Mark for a delayed retry: `15 × retries` minutes from `now`.
    pub fn schedule_resend(&mut self, now: DateTime<Utc>) {
        self.retries += 1;
        self.status = WatchStatus::Resend;
        self.send_at = now + Duration::minutes(RESEND_DELAY_MINUTES * i64::from(self.retries));
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, WatchStatus::New | WatchStatus::Resend) && self.send_at <= now
    }
}

impl fmt::Display for WatchedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{file={}, sender={}, receiver={}, status={}, retries={}, sendAt={}}}",
            self.file.display(),
            self.sender_id,
            self.receiver_id,
            self.status,
            self.retries,
            self.send_at.to_rfc3339()
        )
    }
}
