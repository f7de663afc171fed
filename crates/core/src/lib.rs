//! Typed change records and the queue that carries them
//!
//! This crate provides:
//! - `ChangeType` / `ChangeRecord`: the normalized event model
//! - `ChangeQueue`: unbounded, thread-safe FIFO with per-path deduplication

pub mod queue;
pub mod record;

// Re-exports
pub use queue::ChangeQueue;
pub use record::{ChangeRecord, ChangeType};
