//! Directory watching for dirwatch
//!
//! This crate turns raw `notify` events into a clean stream of typed
//! change records:
//! - Classification into new file / new folder / modified / deleted / renamed
//! - Readiness polling for files still being written
//! - Per-path deduplication of pending records
//! - Fail-fast sessions that a consumer loop reopens on failure

pub mod classify;
pub mod config;
pub mod consumer;
pub mod entry;
pub mod error;
pub mod filter;
pub mod notify_filter;
pub mod raw;
pub mod session;

// Re-exports
pub use config::{OpenRetry, WatchConfig};
pub use consumer::{drain, DrainStats, DEFAULT_POLL_INTERVAL};
pub use dirwatch_core::{ChangeQueue, ChangeRecord, ChangeType};
pub use error::{Result, WatchError};
pub use notify_filter::{NotifyCategory, NotifyFilter};
pub use session::WatchSession;
