//! Ferroas2 Worker
//!
//! Watches partner outboxes and sends what lands in them, one file at a time.
//! The [`DirectoryWatcher`] turns directory changes into scheduler calls; the
//! [`Scheduler`] debounces new files and hands due ones to a [`SendDispatch`].

pub mod context;
pub mod scheduler;
pub mod watcher;

pub use context::SendDispatch;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use watcher::{DirectoryWatcher, WatcherHandle};
