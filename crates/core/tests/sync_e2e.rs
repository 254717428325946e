//! End-to-end tests for the synchronization engine.
//!
//! These tests exercise the real [`SyncEngine`] against local bare git
//! repositories standing in for the remote. No network I/O: clones and
//! pushes use on-disk paths via `git2`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use git2::Repository;
use tempfile::TempDir;

use configsync_core::config::{
    IdentityConfig, RemoteConfig, SyncConfig, WorkspaceConfig, CATEGORIES,
};
use configsync_core::engine::{SyncEngine, SyncOutcome};
use configsync_core::errors::SyncError;
use configsync_core::git::GitClient;
use configsync_core::record;

// ===========================================================================
// Helpers
// ===========================================================================

/// Create a bare repository to act as the remote. Returns its URL (a path).
fn create_bare_remote(dir: &Path) -> String {
    let bare = dir.join("remote.git");
    let repo = Repository::init_bare(&bare).unwrap();
    // Advertise `main` as the remote's default branch.
    repo.set_head("refs/heads/main").unwrap();
    bare.to_str().unwrap().to_string()
}

/// Publish `files` (relative path, contents) as a single commit on `main`.
fn publish_to_remote(dir: &Path, remote_url: &str, files: &[(&str, &str)]) {
    let work = dir.join("publisher");
    let client = GitClient::init_with_remote(&work, remote_url).unwrap();
    for (rel, contents) in files {
        let path = work.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
    }
    client.commit_all("publish fixtures", "Test", "test@test.com").unwrap();
    client.checkout_new_branch("main").unwrap();
    client.push("origin", "refs/heads/main", None).unwrap();
    std::fs::remove_dir_all(&work).unwrap();
}

fn engine_for(target: &Path, remote_url: &str) -> SyncEngine {
    SyncEngine::new(SyncConfig {
        remote: RemoteConfig {
            url: remote_url.to_string(),
            token_env: None,
            branch: "main".into(),
            token: None,
        },
        workspace: WorkspaceConfig {
            path: target.to_path_buf(),
        },
        identity: IdentityConfig::default(),
    })
}

/// Recursively snapshot a tree as relative-path -> bytes, for
/// byte-for-byte comparisons across a run.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

fn scratch_paths(target: &Path) -> (PathBuf, PathBuf) {
    let mut temp = target.as_os_str().to_os_string();
    temp.push("_temp");
    let mut backup = target.as_os_str().to_os_string();
    backup.push("_backup");
    (PathBuf::from(temp), PathBuf::from(backup))
}

fn assert_no_scratch(target: &Path) {
    let (temp, backup) = scratch_paths(target);
    assert!(!temp.exists(), "staging directory left behind");
    assert!(!backup.exists(), "backup directory left behind");
}

// ===========================================================================
// First run / bootstrap
// ===========================================================================

#[test]
fn first_run_against_empty_remote_bootstraps() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    let target = dir.path().join("db");

    let report = engine_for(&target, &remote_url).run().unwrap();
    assert!(report.bootstrapped);
    assert!(report.completed_at.is_some());

    // Target exists with the baseline category folders and marker file.
    for category in CATEGORIES {
        assert!(target.join(category).is_dir(), "missing {}", category);
    }
    assert!(target.join("README.md").exists());
    assert_no_scratch(&target);

    // One commit, pushed to the remote's primary branch.
    let local = Repository::open(&target).unwrap();
    let head = local.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.parent_count(), 0);
    assert_eq!(local.head().unwrap().shorthand(), Some("main"));

    let remote = Repository::open_bare(&remote_url).unwrap();
    let remote_head = remote
        .find_reference("refs/heads/main")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    assert_eq!(remote_head.id(), head.id());
}

#[test]
fn second_engine_sees_bootstrapped_remote() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());

    let first = engine_for(&dir.path().join("db_a"), &remote_url)
        .run()
        .unwrap();
    assert!(first.bootstrapped);

    let second = engine_for(&dir.path().join("db_b"), &remote_url)
        .run()
        .unwrap();
    assert!(!second.bootstrapped, "bootstrap must not re-run");
    assert!(dir.path().join("db_b").join("README.md").exists());
}

// ===========================================================================
// Merge behavior
// ===========================================================================

#[test]
fn name_collision_renames_local_and_keeps_remote() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    publish_to_remote(
        dir.path(),
        &remote_url,
        &[("custom_formats/HDR.yml", "name: HDR\nsource: remote\n")],
    );

    // Prior local copy with a record of the same logical name.
    let target = dir.path().join("db");
    std::fs::create_dir_all(target.join("custom_formats")).unwrap();
    std::fs::write(
        target.join("custom_formats/HDR.yml"),
        "name: HDR\nsource: local\n",
    )
    .unwrap();

    let report = engine_for(&target, &remote_url).run().unwrap();
    let formats = report
        .categories
        .iter()
        .find(|c| c.category == "custom_formats")
        .unwrap();
    assert_eq!(formats.carried, 1);
    assert_eq!(
        formats.renamed,
        vec![("HDR".to_string(), "HDR (1)".to_string())]
    );

    // Two records now exist: remote wins the name, local is renamed.
    let remote_rec = record::read_record(&target.join("custom_formats/HDR.yml")).unwrap();
    assert_eq!(
        remote_rec.payload.get("source"),
        Some(&serde_yaml::Value::String("remote".into()))
    );
    let local_rec = record::read_record(&target.join("custom_formats/HDR (1).yml")).unwrap();
    assert_eq!(local_rec.name, "HDR (1)");
    assert_eq!(
        local_rec.payload.get("source"),
        Some(&serde_yaml::Value::String("local".into()))
    );

    assert_eq!(record::list_records(&target.join("custom_formats")).unwrap().len(), 2);
    assert_no_scratch(&target);
}

#[test]
fn local_records_never_lost_across_runs() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    publish_to_remote(
        dir.path(),
        &remote_url,
        &[("quality_profiles/HD.yml", "name: HD\ncutoff: 5\n")],
    );

    let target = dir.path().join("db");
    std::fs::create_dir_all(target.join("quality_profiles")).unwrap();
    std::fs::write(
        target.join("quality_profiles/Mine.yml"),
        "name: Mine\ncutoff: 9\n",
    )
    .unwrap();

    let engine = engine_for(&target, &remote_url);

    // First run: local record carried alongside the remote one.
    engine.run().unwrap();
    let profiles = target.join("quality_profiles");
    assert!(profiles.join("HD.yml").exists());
    assert!(profiles.join("Mine.yml").exists());
    assert_eq!(record::list_records(&profiles).unwrap().len(), 2);

    // Second run: every record from the previous copy survives under some
    // name. The remote-sourced HD record in the backup collides with the
    // freshly retrieved one and is renamed rather than deduplicated —
    // identical payloads still collide.
    engine.run().unwrap();
    assert!(profiles.join("Mine.yml").exists());
    assert!(profiles.join("HD.yml").exists());
    assert!(profiles.join("HD (1).yml").exists());
    assert_eq!(record::list_records(&profiles).unwrap().len(), 3);
    assert_no_scratch(&target);
}

#[test]
fn missing_category_folder_is_created() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    // Remote with history but none of the category folders.
    publish_to_remote(dir.path(), &remote_url, &[("README.md", "# cfg\n")]);

    let target = dir.path().join("db");
    let report = engine_for(&target, &remote_url).run().unwrap();
    assert!(!report.bootstrapped);
    for category in CATEGORIES {
        assert!(target.join(category).is_dir());
    }
}

// ===========================================================================
// Failure paths
// ===========================================================================

#[test]
fn retrieval_failure_leaves_target_untouched() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("db");
    std::fs::create_dir_all(target.join("custom_formats")).unwrap();
    std::fs::write(
        target.join("custom_formats/HDR.yml"),
        "name: HDR\nsource: local\n",
    )
    .unwrap();
    let before = snapshot(&target);

    let engine = engine_for(&target, "/nonexistent/remote.git");
    let err = engine.run().unwrap_err();
    assert!(matches!(
        err,
        SyncError::Retrieval(_) | SyncError::Bootstrap(_)
    ));

    assert_eq!(snapshot(&target), before, "target must be byte-identical");
    assert_no_scratch(&target);
}

#[test]
fn merge_failure_after_promotion_rolls_back() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    publish_to_remote(
        dir.path(),
        &remote_url,
        &[("custom_formats/HDR.yml", "name: HDR\n")],
    );

    // A malformed local record makes the merge phase fail after promotion.
    let target = dir.path().join("db");
    std::fs::create_dir_all(target.join("custom_formats")).unwrap();
    std::fs::write(target.join("custom_formats/good.yml"), "name: Good\n").unwrap();
    std::fs::write(target.join("custom_formats/bad.yml"), "no_name: true\n").unwrap();
    let before = snapshot(&target);

    let err = engine_for(&target, &remote_url).run().unwrap_err();
    assert!(matches!(err, SyncError::Merge(_)));

    assert_eq!(
        snapshot(&target),
        before,
        "rollback must restore the pre-run target exactly"
    );
    assert_no_scratch(&target);
}

#[test]
fn orphaned_scratch_directories_are_recovered() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    publish_to_remote(
        dir.path(),
        &remote_url,
        &[("quality_profiles/HD.yml", "name: HD\n")],
    );

    // Simulate a crash that left a backup but no target.
    let target = dir.path().join("db");
    let (temp, backup) = scratch_paths(&target);
    std::fs::create_dir_all(backup.join("quality_profiles")).unwrap();
    std::fs::write(
        backup.join("quality_profiles/Mine.yml"),
        "name: Mine\n",
    )
    .unwrap();
    std::fs::create_dir_all(&temp).unwrap();
    std::fs::write(temp.join("junk.txt"), "stale").unwrap();

    let report = engine_for(&target, &remote_url).run().unwrap();
    assert!(report.recovered);

    // The record stranded in the backup came through the recovered target.
    assert!(target.join("quality_profiles/Mine.yml").exists());
    assert!(target.join("quality_profiles/HD.yml").exists());
    assert_no_scratch(&target);
}

// ===========================================================================
// Caller-facing outcome
// ===========================================================================

#[test]
fn outcome_pair_reflects_run_result() {
    let dir = TempDir::new().unwrap();
    let remote_url = create_bare_remote(dir.path());
    let target = dir.path().join("db");

    let outcome: SyncOutcome = engine_for(&target, &remote_url).run_to_outcome();
    assert!(outcome.success);
    assert!(outcome.message.contains("synchronized"));

    let failed = engine_for(&dir.path().join("db2"), "/nonexistent/remote.git").run_to_outcome();
    assert!(!failed.success);
    assert!(failed.message.contains("synchronization failed"));
}
