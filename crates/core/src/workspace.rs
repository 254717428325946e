//! Workspace staging: the backup/swap/cleanup discipline that stands in for
//! a filesystem transaction.
//!
//! A workspace is three sibling paths derived from one base path: the
//! `target` (canonical working copy), `staging` (`<target>_temp`, freshly
//! retrieved content not yet promoted), and `backup` (`<target>_backup`, the
//! previous target set aside during promotion). All moves are whole-tree
//! renames — O(1) and never partially copied.
//!
//! The discipline is best-effort, not crash-safe: a hard kill mid-move can
//! orphan `_temp` or `_backup`. [`recover`] is the idempotent restart-time
//! routine that inspects which sibling paths exist and restores the last
//! safe state before a new run begins.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::StageError;

// ---------------------------------------------------------------------------
// Run state machine
// ---------------------------------------------------------------------------

/// States of a synchronization run.
///
/// `Idle -> Staged -> Promoted -> Merging -> Finalized`, with `RolledBack`
/// as the terminal state of any failed run after promotion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Staged,
    Promoted,
    Merging,
    Finalized,
    RolledBack,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Staged => write!(f, "staged"),
            Self::Promoted => write!(f, "promoted"),
            Self::Merging => write!(f, "merging"),
            Self::Finalized => write!(f, "finalized"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sibling paths
// ---------------------------------------------------------------------------

/// The three sibling paths of one workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    target: PathBuf,
    staging: PathBuf,
    backup: PathBuf,
}

impl WorkspacePaths {
    /// Derive the staging and backup siblings from the target base path.
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        let target = base.as_ref().to_path_buf();
        Self {
            staging: with_suffix(&target, "_temp"),
            backup: with_suffix(&target, "_backup"),
            target,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

// ---------------------------------------------------------------------------
// Backup handle
// ---------------------------------------------------------------------------

/// Handle to the backup produced by [`promote`].
///
/// The backup does not exist if the target did not exist before promotion
/// (first-ever run); the merge phase and rollback both check [`Self::path`].
#[derive(Debug)]
pub struct BackupHandle {
    path: PathBuf,
    exists: bool,
}

impl BackupHandle {
    /// The backup path, if a backup was taken.
    pub fn path(&self) -> Option<&Path> {
        if self.exists {
            Some(&self.path)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Promotion / finalize / rollback
// ---------------------------------------------------------------------------

/// Swap the staging tree into the target path, setting the previous target
/// aside as the backup.
///
/// If the second rename fails after the target was already moved aside, the
/// backup is moved back before the error surfaces, so a failed promotion
/// leaves the pre-run state intact.
pub fn promote(paths: &WorkspacePaths) -> Result<BackupHandle, StageError> {
    let had_target = paths.target().exists();
    if had_target {
        info!(
            from = %paths.target().display(),
            to = %paths.backup().display(),
            "backing up existing target"
        );
        rename(paths.target(), paths.backup())?;
    }

    info!(
        from = %paths.staging().display(),
        to = %paths.target().display(),
        "promoting staging to target"
    );
    if let Err(e) = rename(paths.staging(), paths.target()) {
        if had_target {
            warn!("promotion failed after backup; restoring target");
            if let Err(restore_err) = rename(paths.backup(), paths.target()) {
                warn!(error = %restore_err, "failed to restore backup after failed promotion");
            }
        }
        return Err(e);
    }

    Ok(BackupHandle {
        path: paths.backup().to_path_buf(),
        exists: had_target,
    })
}

/// Delete the backup. Called only after every category merged successfully.
///
/// Removal failure is logged, not raised: the run has already succeeded and
/// a leftover `_backup` is swept by [`recover`] on the next run.
pub fn finalize(handle: BackupHandle) {
    if let Some(backup) = handle.path() {
        info!(path = %backup.display(), "removing backup");
        if let Err(e) = std::fs::remove_dir_all(backup) {
            warn!(path = %backup.display(), error = %e, "failed to remove backup");
        }
    }
}

/// Best-effort restoration of the pre-run state after a failure.
///
/// Deletes any leftover staging tree, then (if a backup exists) replaces the
/// promoted target with the backup. Every step tolerates prior partial
/// failure — a missing staging directory or absent target is not an error —
/// and no step raises: a secondary failure here must not mask the error that
/// triggered the rollback.
pub fn rollback(handle: &BackupHandle, paths: &WorkspacePaths) {
    if paths.staging().exists() {
        debug!(path = %paths.staging().display(), "discarding leftover staging");
        if let Err(e) = std::fs::remove_dir_all(paths.staging()) {
            warn!(path = %paths.staging().display(), error = %e, "failed to remove staging");
        }
    }

    if let Some(backup) = handle.path() {
        if backup.exists() {
            if paths.target().exists() {
                if let Err(e) = std::fs::remove_dir_all(paths.target()) {
                    warn!(path = %paths.target().display(), error = %e, "failed to remove promoted target during rollback");
                    return;
                }
            }
            info!(
                from = %backup.display(),
                to = %paths.target().display(),
                "restoring backup to target"
            );
            if let Err(e) = std::fs::rename(backup, paths.target()) {
                warn!(error = %e, "failed to restore backup to target");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Crash recovery
// ---------------------------------------------------------------------------

/// What [`recover`] found and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    /// An orphaned `_temp` directory was discarded.
    pub staging_discarded: bool,
    /// An orphaned `_backup` directory was restored onto the target.
    pub backup_restored: bool,
    /// An orphaned `_backup` was restored over a half-finished target.
    pub target_discarded: bool,
}

/// Idempotent restart-time recovery: inspect which sibling paths exist and
/// restore the last safe state.
///
/// - Leftover staging is always scratch from a dead run; discard it.
/// - A backup with no target means the previous run died between the two
///   promotion renames; the backup is the canonical state — restore it.
/// - A backup alongside a target means the previous run died mid-merge; the
///   target may hold a partial merge, so it is discarded and the backup
///   restored (the remote content is refetched on the next run).
///
/// Running this against a clean workspace is a no-op.
pub fn recover(paths: &WorkspacePaths) -> Result<Recovery, StageError> {
    let mut recovery = Recovery::default();

    if paths.staging().exists() {
        warn!(path = %paths.staging().display(), "discarding orphaned staging directory");
        remove_tree(paths.staging())?;
        recovery.staging_discarded = true;
    }

    if paths.backup().exists() {
        if paths.target().exists() {
            warn!(
                path = %paths.target().display(),
                "orphaned backup alongside target; discarding possibly half-merged target"
            );
            remove_tree(paths.target())?;
            recovery.target_discarded = true;
        }
        warn!(path = %paths.backup().display(), "restoring orphaned backup to target");
        rename(paths.backup(), paths.target())?;
        recovery.backup_restored = true;
    }

    Ok(recovery)
}

// ---------------------------------------------------------------------------
// Primitive wrappers
// ---------------------------------------------------------------------------

fn rename(from: &Path, to: &Path) -> Result<(), StageError> {
    std::fs::rename(from, to).map_err(|e| StageError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })
}

fn remove_tree(path: &Path) -> Result<(), StageError> {
    std::fs::remove_dir_all(path).map_err(|e| StageError::RemoveFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
