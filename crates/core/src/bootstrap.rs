//! Retrieval bootstrapper: obtain the remote repository into the staging
//! workspace, seeding a baseline structure when the remote is empty or
//! does not exist yet.

use std::path::Path;

use tracing::{info, instrument};

use crate::config::{IdentityConfig, RemoteConfig, CATEGORIES};
use crate::errors::{BootstrapError, SyncError};
use crate::git::GitClient;

/// Marker file written into a freshly seeded repository.
const MARKER_FILE: &str = "README.md";

const MARKER_CONTENTS: &str = "# Configuration Repository\n\n\
This repository contains regex patterns, custom formats and quality profiles.\n";

const INITIAL_COMMIT_MESSAGE: &str = "Initial commit: base repository structure";

/// Populate `staging` from the remote.
///
/// A missing remote repository is handled by initializing an empty local
/// repository with the remote registered; an empty repository (no history)
/// is seeded with the category folders, a marker file, an initial commit on
/// the primary branch, and pushed to the remote — once as a plain branch
/// push and once with an explicit tracking refspec, so both the remote's
/// branch reference and its tracking metadata are established. Re-running
/// the seed against an already-initialized remote is harmless.
///
/// Any other transport failure aborts before the real target is touched;
/// the caller discards staging.
///
/// Returns `true` if the empty-remote bootstrap ran.
#[instrument(skip(remote, identity), fields(url = %remote.url, staging = %staging.display()))]
pub fn fetch(
    remote: &RemoteConfig,
    identity: &IdentityConfig,
    staging: &Path,
) -> Result<bool, SyncError> {
    let token = remote.token.as_deref();

    let client = match GitClient::clone_repo(&remote.url, staging, token) {
        Ok(client) => client,
        Err(crate::errors::RetrievalError::RemoteMissing { .. }) => {
            info!("remote repository missing; initializing a new one");
            GitClient::init_with_remote(staging, &remote.url)?
        }
        Err(e) => return Err(e.into()),
    };

    if client.has_history() {
        return Ok(false);
    }

    info!("repository is empty; seeding baseline structure");
    seed_empty_repository(&client, remote, identity)?;
    Ok(true)
}

/// Create the baseline structure in an empty repository and publish it.
fn seed_empty_repository(
    client: &GitClient,
    remote: &RemoteConfig,
    identity: &IdentityConfig,
) -> Result<(), BootstrapError> {
    let root = client.repo_path();

    for category in CATEGORIES {
        std::fs::create_dir_all(root.join(category)).map_err(|e| BootstrapError::SeedFailed {
            path: root.join(category),
            detail: e.to_string(),
        })?;
    }
    std::fs::write(root.join(MARKER_FILE), MARKER_CONTENTS).map_err(|e| {
        BootstrapError::SeedFailed {
            path: root.join(MARKER_FILE),
            detail: e.to_string(),
        }
    })?;

    client.commit_all(
        INITIAL_COMMIT_MESSAGE,
        &identity.author_name,
        &identity.author_email,
    )?;
    client.checkout_new_branch(&remote.branch)?;

    let token = remote.token.as_deref();
    let branch_ref = format!("refs/heads/{}", remote.branch);
    let tracking_refspec = format!("{}:{}", branch_ref, branch_ref);
    client.push("origin", &branch_ref, token)?;
    client.push("origin", &tracking_refspec, token)?;

    info!(branch = %remote.branch, "seeded and published baseline structure");
    Ok(())
}
