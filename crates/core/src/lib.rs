//! configsync core library.
//!
//! This crate refreshes a local working copy of a git-backed configuration
//! repository from its remote while preserving locally authored records:
//! retrieval into a staging sibling, rename-based promotion with a backup of
//! the previous copy, per-category record merging with deterministic
//! collision renaming, and best-effort rollback if any step fails.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod errors;
pub mod git;
pub mod merge;
pub mod record;
pub mod workspace;

// Re-exports for convenience.
pub use config::{SyncConfig, CATEGORIES};
pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use errors::SyncError;
