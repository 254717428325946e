//! TOML-based configuration for the synchronization engine.
//!
//! The access token is stored as a `token_env` field referencing an
//! environment variable name; the actual secret is resolved at runtime via
//! [`SyncConfig::resolve_env_vars`] and never serialized back out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// The fixed set of category folders managed by the engine.
///
/// Categories are a static constant, not discovered from repository content:
/// the merge phase iterates exactly these folders, and the bootstrapper seeds
/// exactly these folders into an empty remote.
pub const CATEGORIES: [&str; 3] = ["regex_patterns", "custom_formats", "quality_profiles"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote repository settings.
    pub remote: RemoteConfig,

    /// Local workspace settings.
    pub workspace: WorkspaceConfig,

    /// Commit identity for bootstrap commits.
    #[serde(default)]
    pub identity: IdentityConfig,
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Remote repository endpoint and credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Repository URL (e.g. `https://github.com/org/config-db.git`).
    pub url: String,

    /// Environment variable holding the access token. Optional: anonymous
    /// access and `file://` remotes need no credential.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Primary branch name pushed during bootstrap.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_branch() -> String {
    "main".into()
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Local workspace settings.
///
/// `path` is the canonical target working copy; the engine derives its
/// staging and backup siblings (`<path>_temp`, `<path>_backup`) from it.
/// The engine assumes it owns all three paths for the duration of a run;
/// exclusivity across concurrent runs is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Base path of the target working copy.
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Commit identity used when the engine creates commits of its own
/// (bootstrap of an empty remote).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,
}

fn default_author_name() -> String {
    "configsync".into()
}

fn default_author_email() -> String {
    "sync@configsync.local".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Load configuration from a TOML file and resolve secrets.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        info!(path = %path.display(), "loading configuration");

        let contents = std::fs::read_to_string(path)?;
        let mut config: SyncConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        config.resolve_env_vars()?;
        Ok(config)
    }

    /// Resolve `_env` fields into their runtime secret values.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(var) = &self.remote.token_env {
            match std::env::var(var) {
                Ok(value) if !value.is_empty() => {
                    debug!(var, "resolved access token from environment");
                    self.remote.token = Some(value);
                }
                _ => {
                    return Err(ConfigError::EnvVarMissing {
                        var: var.clone(),
                        field: "remote.token_env".into(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.url".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.remote.branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.branch".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.workspace.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "workspace.path".into(),
                detail: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
