//! Error types for the configsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`SyncError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Propagation policy: any error raised after the staging workspace has been
//! promoted triggers a rollback before it is surfaced; errors raised earlier
//! only require discarding the staging scratch directory. Best-effort cleanup
//! steps (rollback, stale-directory removal) log their own failures and never
//! replace the error that caused them.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for a synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Retrieval errors
// ---------------------------------------------------------------------------

/// Errors while obtaining the remote repository into the staging workspace.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The remote reports that the repository does not exist.
    ///
    /// This is a recoverable, expected condition: the bootstrapper reacts by
    /// initializing an empty local repository and seeding the remote.
    #[error("remote repository not found at '{url}'")]
    RemoteMissing { url: String },

    /// Clone failed for any reason other than a missing repository
    /// (network unreachable, auth rejected, corrupt transfer).
    #[error("failed to clone '{url}': {detail}")]
    CloneFailed { url: String, detail: String },

    /// Initializing a fresh local repository failed.
    #[error("failed to initialize repository at '{path}': {detail}")]
    InitFailed { path: PathBuf, detail: String },

    /// A `git2` library error outside the cases above.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("retrieval I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Bootstrap errors
// ---------------------------------------------------------------------------

/// Errors while seeding an empty remote with the baseline structure.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Writing the baseline category folders or marker file failed.
    #[error("failed to seed baseline structure at '{path}': {detail}")]
    SeedFailed { path: PathBuf, detail: String },

    /// The initial commit could not be created.
    #[error("initial commit failed: {0}")]
    CommitFailed(String),

    /// Creating or checking out the primary branch failed.
    #[error("branch setup failed for '{branch}': {detail}")]
    BranchFailed { branch: String, detail: String },

    /// Push was rejected or failed in transport.
    #[error("push of '{refspec}' failed: {detail}")]
    PushFailed { refspec: String, detail: String },

    /// A `git2` library error outside the cases above.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("bootstrap I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Staging errors
// ---------------------------------------------------------------------------

/// Errors from whole-tree workspace moves (promotion, finalize).
#[derive(Debug, Error)]
pub enum StageError {
    /// A rename of one sibling path onto another failed.
    #[error("failed to move '{from}' to '{to}': {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// A scratch directory could not be removed.
    #[error("failed to remove '{path}': {source}")]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Generic I/O wrapper.
    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Record errors
// ---------------------------------------------------------------------------

/// Errors from reading or writing a single serialized record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The file is not valid YAML, is not a mapping, or lacks a string
    /// `name` field.
    #[error("malformed record '{path}': {detail}")]
    Parse { path: PathBuf, detail: String },

    /// The file could not be read or written.
    #[error("record I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from merging one category's local records into the promoted tree.
///
/// A failure on any individual record aborts the whole run; a partially
/// merged category is indistinguishable from a successful one to the caller.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A backup record could not be parsed or carried over.
    #[error("merge failed in category '{category}': {source}")]
    Record {
        category: String,
        source: RecordError,
    },

    /// The category folder could not be created or listed.
    #[error("merge I/O error in category '{category}': {source}")]
    Io {
        category: String,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}
