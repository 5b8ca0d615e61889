//! Ferroas2 Storage Library
//!
//! Durable storage for everything the protocol engine has to remember: received
//! files, MDNs (sent and received) and the records of sends still waiting on an
//! async MDN.
//!
//! # Layout
//!
//! All paths are derived from [`ferroas2_core::Directories`]:
//!
//! - received files: `inbox/{sender}/{file name}`, with `.1`, `.2`, ... appended on
//!   collision
//! - MDNs: `system/mdn/{message id}.mdn.json`
//! - pending MDN records: `system/pending/mdn-info/{message id}.json`, with the spooled
//!   outbound file moved to `system/pending/mdn/`
//! - acknowledged sends: `system/sent/{receiver}/{file name}`
//!
//! Every identifier that comes off the wire goes through
//! [`ferroas2_core::validation::make_file_name`] before it touches the filesystem.

pub(crate) mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::FileSystemStore;
pub use traits::{As2Store, StorageError, StorageResult};
