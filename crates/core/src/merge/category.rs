//! Per-category reconciliation of locally authored records into the
//! promoted workspace.
//!
//! The promoted (remote-sourced) copy wins every name collision; the local
//! record is renamed via the collision resolver, never dropped and never
//! content-merged. Colliding records with byte-identical payloads are still
//! renamed: the resolver does not inspect content.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::MergeError;
use crate::merge::collision::resolve_name;
use crate::record::{self, Record};

/// Outcome of merging one category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryReport {
    /// Category folder name.
    pub category: String,
    /// Number of backup records carried into the target.
    pub carried: usize,
    /// Records that collided, as `(original name, resolved name)` pairs.
    pub renamed: Vec<(String, String)>,
}

/// Merge the backup's copy of `category` into the promoted target.
///
/// Ensures the category folder exists under `target_root`, then carries every
/// record from the backup's category folder into it, renaming on collision.
/// `backup_root` is `None` on a first-ever run (nothing to merge).
///
/// A malformed or unreadable backup record aborts the merge: a partially
/// merged category would be indistinguishable from a successful one.
pub fn merge_category(
    category: &str,
    target_root: &Path,
    backup_root: Option<&Path>,
) -> Result<CategoryReport, MergeError> {
    let target_dir = target_root.join(category);
    if !target_dir.exists() {
        debug!(category, "creating missing category folder");
        std::fs::create_dir_all(&target_dir).map_err(|e| MergeError::Io {
            category: category.to_string(),
            source: e,
        })?;
    }

    let mut report = CategoryReport {
        category: category.to_string(),
        ..Default::default()
    };

    let backup_dir = match backup_root {
        Some(root) => root.join(category),
        None => return Ok(report),
    };
    if !backup_dir.exists() {
        return Ok(report);
    }

    // Names already claimed by the remote-sourced copy.
    let mut taken = record::file_stem_names(&target_dir).map_err(|e| MergeError::Io {
        category: category.to_string(),
        source: e,
    })?;

    let backup_files = record::list_records(&backup_dir).map_err(|e| MergeError::Io {
        category: category.to_string(),
        source: e,
    })?;

    for path in backup_files {
        let mut rec: Record = record::read_record(&path).map_err(|e| MergeError::Record {
            category: category.to_string(),
            source: e,
        })?;

        let resolved = resolve_name(&rec.name, &taken);
        if resolved != rec.name {
            info!(
                category,
                from = %rec.name,
                to = %resolved,
                "renaming local record on collision"
            );
            report.renamed.push((rec.name.clone(), resolved.clone()));
            rec.rename(&resolved);
        }
        taken.insert(resolved);

        record::write_record(&target_dir, &rec).map_err(|e| MergeError::Record {
            category: category.to_string(),
            source: e,
        })?;
        report.carried += 1;
        debug!(category, name = %rec.name, "merged local record");
    }

    info!(
        category,
        carried = report.carried,
        renamed = report.renamed.len(),
        "category merge completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_yaml(dir: &Path, file: &str, contents: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_first_run_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let report = merge_category("custom_formats", dir.path(), None).unwrap();
        assert_eq!(report.carried, 0);
        assert!(report.renamed.is_empty());
        assert!(dir.path().join("custom_formats").is_dir());
    }

    #[test]
    fn test_collision_renames_local_keeps_remote() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let backup = dir.path().join("backup");
        write_yaml(
            &target.join("custom_formats"),
            "HDR.yml",
            "name: HDR\nsource: remote\n",
        );
        write_yaml(
            &backup.join("custom_formats"),
            "HDR.yml",
            "name: HDR\nsource: local\n",
        );

        let report = merge_category("custom_formats", &target, Some(&backup)).unwrap();
        assert_eq!(report.carried, 1);
        assert_eq!(report.renamed, vec![("HDR".to_string(), "HDR (1)".to_string())]);

        let remote = record::read_record(&target.join("custom_formats/HDR.yml")).unwrap();
        assert_eq!(
            remote.payload.get("source"),
            Some(&serde_yaml::Value::String("remote".into()))
        );
        let local = record::read_record(&target.join("custom_formats/HDR (1).yml")).unwrap();
        assert_eq!(local.name, "HDR (1)");
    }

    #[test]
    fn test_non_colliding_record_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let backup = dir.path().join("backup");
        std::fs::create_dir_all(target.join("profiles")).unwrap();
        write_yaml(&backup.join("profiles"), "Mine.yml", "name: Mine\ncutoff: 7\n");

        let report = merge_category("profiles", &target, Some(&backup)).unwrap();
        assert_eq!(report.carried, 1);
        assert!(report.renamed.is_empty());
        assert!(target.join("profiles/Mine.yml").exists());
    }

    #[test]
    fn test_identity_is_stored_name_not_filename() {
        // A backup file whose stem disagrees with its stored name collides
        // (or not) based on the stored name.
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let backup = dir.path().join("backup");
        write_yaml(&target.join("profiles"), "HD.yml", "name: HD\n");
        write_yaml(&backup.join("profiles"), "renamed-on-disk.yml", "name: HD\nmine: true\n");

        let report = merge_category("profiles", &target, Some(&backup)).unwrap();
        assert_eq!(report.renamed, vec![("HD".to_string(), "HD (1)".to_string())]);
        let carried = record::read_record(&target.join("profiles/HD (1).yml")).unwrap();
        assert_eq!(carried.name, "HD (1)");
    }

    #[test]
    fn test_two_local_records_colliding_with_each_other() {
        // Both backup records claim the same stored name; the second one is
        // renamed against the universe extended by the first.
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let backup = dir.path().join("backup");
        std::fs::create_dir_all(target.join("profiles")).unwrap();
        write_yaml(&backup.join("profiles"), "a.yml", "name: Dup\nvariant: a\n");
        write_yaml(&backup.join("profiles"), "b.yml", "name: Dup\nvariant: b\n");

        let report = merge_category("profiles", &target, Some(&backup)).unwrap();
        assert_eq!(report.carried, 2);
        assert!(target.join("profiles/Dup.yml").exists());
        assert!(target.join("profiles/Dup (1).yml").exists());
    }

    #[test]
    fn test_identical_payload_still_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let backup = dir.path().join("backup");
        write_yaml(&target.join("custom_formats"), "HDR.yml", "name: HDR\n");
        write_yaml(&backup.join("custom_formats"), "HDR.yml", "name: HDR\n");

        let report = merge_category("custom_formats", &target, Some(&backup)).unwrap();
        assert_eq!(report.renamed.len(), 1);
        assert!(target.join("custom_formats/HDR (1).yml").exists());
    }

    #[test]
    fn test_malformed_backup_record_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let backup = dir.path().join("backup");
        std::fs::create_dir_all(target.join("profiles")).unwrap();
        write_yaml(&backup.join("profiles"), "bad.yml", "no name here: true\n");

        let err = merge_category("profiles", &target, Some(&backup)).unwrap_err();
        assert!(matches!(err, MergeError::Record { .. }));
    }
}
