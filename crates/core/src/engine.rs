//! Synchronization run orchestration.
//!
//! A run walks the state machine `Idle -> Staged -> Promoted -> Merging ->
//! Finalized`, with `RolledBack` terminating any run that fails after
//! promotion:
//!
//! 1. Recover any scratch state orphaned by a previous crash.
//! 2. Retrieve the remote into the staging sibling (bootstrapping an empty
//!    remote if needed).
//! 3. Promote staging to the target, setting the old target aside as backup.
//! 4. Merge each category's backup records into the promoted target.
//! 5. Remove the backup on success; restore it on any failure.
//!
//! Execution is synchronous and single-threaded. The engine takes no locks:
//! the caller guarantees that at most one run owns a given target path (and
//! remote endpoint) at a time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::bootstrap;
use crate::config::{SyncConfig, CATEGORIES};
use crate::errors::SyncError;
use crate::merge::{merge_category, CategoryReport};
use crate::workspace::{self, RunState, WorkspacePaths};

// ---------------------------------------------------------------------------
// Report / outcome
// ---------------------------------------------------------------------------

/// Summary of one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Unique id of this run.
    pub run_id: String,
    /// RFC3339 start timestamp.
    pub started_at: String,
    /// RFC3339 completion timestamp.
    pub completed_at: Option<String>,
    /// Whether crash recovery touched the workspace before the run.
    pub recovered: bool,
    /// Whether the empty-remote bootstrap ran.
    pub bootstrapped: bool,
    /// Per-category merge results.
    pub categories: Vec<CategoryReport>,
    /// Terminal state of the run.
    pub final_state: RunState,
}

impl SyncReport {
    fn carried(&self) -> usize {
        self.categories.iter().map(|c| c.carried).sum()
    }

    fn renamed(&self) -> usize {
        self.categories.iter().map(|c| c.renamed.len()).sum()
    }
}

/// The caller-facing `(success, message)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
}

impl From<Result<SyncReport, SyncError>> for SyncOutcome {
    fn from(result: Result<SyncReport, SyncError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                message: format!(
                    "repository synchronized: {} local record(s) carried, {} renamed{}",
                    report.carried(),
                    report.renamed(),
                    if report.bootstrapped {
                        " (bootstrapped empty remote)"
                    } else {
                        ""
                    }
                ),
            },
            Err(e) => Self {
                success: false,
                message: format!("synchronization failed: {}", e),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The synchronization engine.
pub struct SyncEngine {
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Execute one full synchronization run.
    ///
    /// Any error raised before promotion leaves the existing target
    /// untouched (only staging is discarded); any error raised after
    /// promotion rolls the target back to its pre-run content before the
    /// error surfaces.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let paths = WorkspacePaths::new(&self.config.workspace.path);
        let mut state = RunState::Idle;
        let mut report = SyncReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            recovered: false,
            bootstrapped: false,
            categories: Vec::new(),
            final_state: state,
        };
        info!(run_id = %report.run_id, target = %paths.target().display(), "starting synchronization run");

        // Sweep scratch state left behind by a crashed run.
        let recovery = workspace::recover(&paths)?;
        report.recovered = recovery != workspace::Recovery::default();

        // Retrieve into staging. Failure here never touches the target.
        report.bootstrapped =
            match bootstrap::fetch(&self.config.remote, &self.config.identity, paths.staging()) {
                Ok(bootstrapped) => bootstrapped,
                Err(e) => {
                    error!(error = %e, "retrieval failed; discarding staging");
                    discard_staging(&paths);
                    return Err(e);
                }
            };
        transition(&mut state, RunState::Staged);

        let handle = match workspace::promote(&paths) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "promotion failed; discarding staging");
                discard_staging(&paths);
                return Err(e.into());
            }
        };
        transition(&mut state, RunState::Promoted);

        transition(&mut state, RunState::Merging);
        for category in CATEGORIES {
            match merge_category(category, paths.target(), handle.path()) {
                Ok(category_report) => report.categories.push(category_report),
                Err(e) => {
                    error!(category, error = %e, "merge failed; rolling back");
                    workspace::rollback(&handle, &paths);
                    transition(&mut state, RunState::RolledBack);
                    return Err(e.into());
                }
            }
        }

        workspace::finalize(handle);
        transition(&mut state, RunState::Finalized);

        report.final_state = state;
        report.completed_at = Some(Utc::now().to_rfc3339());
        info!(
            run_id = %report.run_id,
            carried = report.carried(),
            renamed = report.renamed(),
            bootstrapped = report.bootstrapped,
            "synchronization run completed"
        );
        Ok(report)
    }

    /// Execute a run and reduce it to the `(success, message)` pair.
    pub fn run_to_outcome(&self) -> SyncOutcome {
        SyncOutcome::from(self.run())
    }
}

fn transition(state: &mut RunState, to: RunState) {
    info!(from = %state, to = %to, "run state transition");
    *state = to;
}

fn discard_staging(paths: &WorkspacePaths) {
    if paths.staging().exists() {
        if let Err(e) = std::fs::remove_dir_all(paths.staging()) {
            warn!(path = %paths.staging().display(), error = %e, "failed to discard staging");
        }
    }
}
