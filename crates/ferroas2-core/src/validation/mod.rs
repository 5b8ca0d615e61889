//! Validation modules

pub mod filename;

pub use filename::{is_blank, make_file_name};
