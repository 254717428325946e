//! Local Git repository operations via `git2`.
//!
//! [`GitClient`] is the VCS capability consumed by the retrieval
//! bootstrapper: clone with missing-remote classification, init with a
//! registered remote, history probing, stage-all commits, branch setup,
//! and pushes with rejection capture.

use std::path::{Path, PathBuf};

use git2::{
    Cred, ErrorClass, ErrorCode, FetchOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use tracing::{debug, info, instrument, warn};

use crate::errors::{BootstrapError, RetrievalError};

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl std::fmt::Debug for GitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitClient")
            .field("repo_path", &self.repo_path)
            .finish_non_exhaustive()
    }
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, RetrievalError> {
        let path = repo_path.as_ref();
        debug!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Clone a remote repository to `path`.
    ///
    /// A remote that answers "repository not found" is reported as
    /// [`RetrievalError::RemoteMissing`] so the caller can fall back to
    /// initializing and bootstrapping; every other failure is a
    /// [`RetrievalError::CloneFailed`].
    #[instrument(skip(token), fields(url = %url, path = %path.display()))]
    pub fn clone_repo(url: &str, path: &Path, token: Option<&str>) -> Result<Self, RetrievalError> {
        info!("cloning repository into staging");
        let mut callbacks = RemoteCallbacks::new();
        if let Some(tok) = token {
            let tok = tok.to_string();
            callbacks.credentials(move |_url, _username, _allowed| {
                Cred::userpass_plaintext("x-access-token", &tok)
            });
        }
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(callbacks);
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);
        match builder.clone(url, path) {
            Ok(repo) => {
                info!("clone completed");
                Ok(Self {
                    repo,
                    repo_path: path.to_path_buf(),
                })
            }
            Err(e) if is_remote_missing(&e) => {
                info!("remote reports repository not found");
                Err(RetrievalError::RemoteMissing { url: url.into() })
            }
            Err(e) => Err(RetrievalError::CloneFailed {
                url: url.into(),
                detail: e.message().to_string(),
            }),
        }
    }

    /// Initialize an empty repository at `path` with `url` registered as
    /// the `origin` remote.
    #[instrument(fields(url = %url, path = %path.display()))]
    pub fn init_with_remote(path: &Path, url: &str) -> Result<Self, RetrievalError> {
        info!("initializing empty repository");
        let repo = Repository::init(path).map_err(|e| RetrievalError::InitFailed {
            path: path.to_path_buf(),
            detail: e.message().to_string(),
        })?;
        repo.remote("origin", url)
            .map_err(|e| RetrievalError::InitFailed {
                path: path.to_path_buf(),
                detail: e.message().to_string(),
            })?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether the repository has any history (HEAD resolves to a commit).
    ///
    /// `false` for a freshly initialized repository or a clone of an empty
    /// remote (unborn HEAD) — the degenerate case that triggers bootstrap.
    pub fn has_history(&self) -> bool {
        self.repo.head().is_ok()
    }

    /// Stage all changes and create a commit.
    ///
    /// Handles the parentless initial commit on an unborn HEAD.
    #[instrument(skip(self, message))]
    pub fn commit_all(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<Oid, BootstrapError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let signature = Signature::now(author_name, author_email)?;
        let parent_commit = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| BootstrapError::CommitFailed(e.message().to_string()))?;
        info!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Create branch `name` at HEAD (replacing it if present) and check it out.
    #[instrument(skip(self))]
    pub fn checkout_new_branch(&self, name: &str) -> Result<(), BootstrapError> {
        let commit = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| BootstrapError::BranchFailed {
                branch: name.to_string(),
                detail: e.message().to_string(),
            })?;
        // force=true keeps bootstrap idempotent when the branch already exists.
        self.repo
            .branch(name, &commit, true)
            .map_err(|e| BootstrapError::BranchFailed {
                branch: name.to_string(),
                detail: e.message().to_string(),
            })?;
        self.repo.set_head(&format!("refs/heads/{}", name))?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        info!(name, "created and checked out branch");
        Ok(())
    }

    /// Push `refspec` to a named remote.
    #[instrument(skip(self, token))]
    pub fn push(
        &self,
        remote_name: &str,
        refspec: &str,
        token: Option<&str>,
    ) -> Result<(), BootstrapError> {
        info!(remote = remote_name, refspec, "pushing");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut callbacks = RemoteCallbacks::new();
        if let Some(tok) = token {
            let tok = tok.to_string();
            callbacks.credentials(move |_url, _username, _allowed| {
                Cred::userpass_plaintext("x-access-token", &tok)
            });
        }
        let push_error = std::sync::Arc::new(std::sync::Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap() = Some(msg.to_string());
            }
            Ok(())
        });
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        remote
            .push(&[refspec], Some(&mut push_opts))
            .map_err(|e| BootstrapError::PushFailed {
                refspec: refspec.to_string(),
                detail: e.message().to_string(),
            })?;
        if let Some(err_msg) = push_error.lock().unwrap().take() {
            return Err(BootstrapError::PushFailed {
                refspec: refspec.to_string(),
                detail: err_msg,
            });
        }
        debug!("push completed");
        Ok(())
    }
}

/// Whether a clone failure means the remote repository does not exist,
/// as opposed to a transport or auth failure.
///
/// GitHub-style remotes answer with a "repository not found" message;
/// HTTP remotes may surface a plain 404.
fn is_remote_missing(e: &git2::Error) -> bool {
    let message = e.message().to_ascii_lowercase();
    message.contains("repository not found")
        || (e.code() == ErrorCode::NotFound && e.class() == ErrorClass::Http)
        || message.contains("unexpected http status code: 404")
}
