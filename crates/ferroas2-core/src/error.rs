//! Error types module
//!
//! All protocol failures are unified under [`As2Error`]. The variants follow the AS2
//! error taxonomy: format and protocol errors are rejected immediately, security and
//! disposition errors become error MDNs when a reply can be sent, transport errors
//! are surfaced to the scheduler.

use std::io;

use crate::disposition::DispositionType;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors such as malformed partner input
    Debug,
    /// Recoverable issues such as an unreachable partner
    Warn,
    /// Unexpected failures
    Error,
}

/// Describes how an error should be presented to a partner and in logs.
pub trait ErrorMetadata {
    /// HTTP status code to answer with when the error ends a request
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "SECURITY_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same operation later may succeed
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum As2Error {
    #[error("{0}")]
    Protocol(String),

    #[error("{0} method not supported")]
    MethodNotAllowed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    /// A failure that has a disposition to report back to the partner.
    #[error("{message}")]
    Disposition {
        disposition: DispositionType,
        message: String,
        /// Explanatory text returned by the partner, when the disposition came from an MDN.
        text: Option<String>,
    },

    #[error("Transport error: {message}")]
    Transport { status: Option<u16>, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("MIME error: {0}")]
    Mime(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type As2Result<T> = Result<T, As2Error>;

impl As2Error {
    pub fn disposition(disposition: DispositionType, message: impl Into<String>) -> Self {
        As2Error::Disposition {
            disposition,
            message: message.into(),
            text: None,
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        As2Error::Transport {
            status,
            message: message.into(),
        }
    }

    /// The disposition carried by this error, if any.
    pub fn disposition_type(&self) -> Option<&DispositionType> {
        match self {
            As2Error::Disposition { disposition, .. } => Some(disposition),
            _ => None,
        }
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, log_level).
fn as2_error_static_metadata(err: &As2Error) -> (u16, &'static str, bool, LogLevel) {
    match err {
        As2Error::Protocol(_) => (400, "PROTOCOL_ERROR", false, LogLevel::Debug),
        As2Error::MethodNotAllowed(_) => (405, "METHOD_NOT_ALLOWED", false, LogLevel::Debug),
        As2Error::InvalidFormat(_) => (400, "INVALID_FORMAT", false, LogLevel::Debug),
        As2Error::Security(_) => (500, "SECURITY_ERROR", false, LogLevel::Error),
        As2Error::CertificateNotFound(_) => (500, "CERTIFICATE_NOT_FOUND", false, LogLevel::Error),
        As2Error::Disposition { .. } => (500, "DISPOSITION_ERROR", false, LogLevel::Warn),
        As2Error::Transport { .. } => (502, "TRANSPORT_ERROR", true, LogLevel::Warn),
        As2Error::Storage(_) => (500, "STORAGE_ERROR", true, LogLevel::Error),
        As2Error::Mime(_) => (500, "MIME_ERROR", false, LogLevel::Warn),
        As2Error::Config(_) => (500, "CONFIG_ERROR", false, LogLevel::Error),
        As2Error::Internal(_) => (500, "INTERNAL_ERROR", false, LogLevel::Error),
        As2Error::Io(_) => (500, "IO_ERROR", true, LogLevel::Error),
        As2Error::Json(_) => (500, "JSON_ERROR", false, LogLevel::Error),
    }
}

impl ErrorMetadata for As2Error {
    fn http_status_code(&self) -> u16 {
        as2_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        as2_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        as2_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        as2_error_static_metadata(self).3
    }
}

/// Log `error` at its own level, tagged with its code and whether a retry may help.
pub fn log_error(error: &As2Error, message: &str) {
    let error_code = error.error_code();
    let recoverable = error.is_recoverable();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_code, recoverable, "{}", message);
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_code, recoverable, "{}", message);
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_code, recoverable, "{}", message);
        }
    }
}

impl From<anyhow::Error> for As2Error {
    fn from(err: anyhow::Error) -> Self {
        As2Error::Internal(format!("{:#}", err))
    }
}
