//! Record store adapter: one YAML file per named configuration record.
//!
//! A record's authoritative identity is the `name` field stored inside its
//! payload; the filename is a derived presentation detail. The two are kept
//! in lockstep here — [`write_record`] synchronizes the payload's `name`
//! field with the record name before deriving the filename from it, so a
//! rename never leaves the two disagreeing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::errors::RecordError;

/// File extension for serialized records.
pub const RECORD_EXT: &str = "yml";

/// One named configuration record: a YAML mapping with a string `name` key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Logical name, unique within its category.
    pub name: String,
    /// Full payload mapping, including the `name` key.
    pub payload: Mapping,
}

impl Record {
    /// Rename the record, updating the stored `name` field in lockstep.
    pub fn rename(&mut self, new_name: &str) {
        self.name = new_name.to_string();
        self.payload.insert(
            Value::String("name".into()),
            Value::String(new_name.to_string()),
        );
    }
}

/// Parse a serialized record file into a [`Record`].
pub fn read_record(path: &Path) -> Result<Record, RecordError> {
    let contents = std::fs::read_to_string(path).map_err(|e| RecordError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_yaml::from_str(&contents).map_err(|e| RecordError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let payload = match value {
        Value::Mapping(m) => m,
        other => {
            return Err(RecordError::Parse {
                path: path.to_path_buf(),
                detail: format!("expected a mapping, got {}", yaml_kind(&other)),
            });
        }
    };
    let name = match payload.get("name") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(_) => {
            return Err(RecordError::Parse {
                path: path.to_path_buf(),
                detail: "'name' field is not a non-empty string".into(),
            });
        }
        None => {
            return Err(RecordError::Parse {
                path: path.to_path_buf(),
                detail: "missing 'name' field".into(),
            });
        }
    };
    Ok(Record { name, payload })
}

/// Serialize a record into `dir`, deriving the filename from its name.
///
/// Returns the path written.
pub fn write_record(dir: &Path, record: &Record) -> Result<PathBuf, RecordError> {
    // Sync the stored name field before deriving the filename from it.
    let mut payload = record.payload.clone();
    payload.insert(
        Value::String("name".into()),
        Value::String(record.name.clone()),
    );
    let path = dir.join(format!("{}.{}", record.name, RECORD_EXT));
    let contents =
        serde_yaml::to_string(&Value::Mapping(payload)).map_err(|e| RecordError::Parse {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    std::fs::write(&path, contents).map_err(|e| RecordError::Io {
        path: path.clone(),
        source: e,
    })?;
    debug!(path = %path.display(), "wrote record");
    Ok(path)
}

/// List record files (`.yml`) in a directory, sorted for deterministic
/// iteration order.
pub fn list_records(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == RECORD_EXT) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// The set of file-stem-derived names in a category folder.
///
/// Used as the collision universe for remote-sourced records, whose stems
/// are unique within a category and match their stored names.
pub fn file_stem_names(dir: &Path) -> Result<BTreeSet<String>, std::io::Error> {
    let mut names = BTreeSet::new();
    for path in list_records(dir)? {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.insert(stem.to_string());
        }
    }
    Ok(names)
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
