//! Ferroas2 Core Library
//!
//! This crate provides the domain models, the disposition grammar, error types,
//! configuration and the generic pipeline engine shared by all Ferroas2 components.

pub mod config;
pub mod constants;
pub mod disposition;
pub mod error;
pub mod headers;
pub mod hooks;
pub mod models;
pub mod pipeline;
pub mod validation;

// Re-export commonly used types
pub use config::{Directories, ServerConfig};
pub use disposition::{DispositionOptions, DispositionType};
pub use error::{log_error, As2Error, As2Result, ErrorMetadata, LogLevel};
pub use headers::Headers;
pub use hooks::{EventLevel, EventSink, NoOpEventSink, Phase, ServerEvent};
pub use models::PartnerDirectory;
pub use pipeline::{DoneHandler, FailureHandler, Pipeline, PipelineContext, PipelineOutcome, Stage};
