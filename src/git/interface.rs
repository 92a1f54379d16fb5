//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to repository queries in
//! gentrack: validity checks, the `origin` URL, the HEAD commit, and the
//! one-line commit log between a recorded SHA and HEAD.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist (e.g. unborn HEAD)
//! - [`GitError::ObjectNotFound`]: A recorded SHA is unknown to the repository
//!
//! # Example
//!
//! ```ignore
//! use gentrack::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let head = git.head_oid()?;
//! println!("HEAD is at {}", head.short(7));
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch => {
                if context == "HEAD" || context.starts_with("refs/") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec | git2::ErrorCode::Ambiguous => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidPath(msg) => GitError::Internal { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to .git directory
    pub git_dir: PathBuf,
    /// Path to working directory
    pub work_dir: PathBuf,
}

/// The Git interface.
///
/// This is the **single point of interaction** with `git2`. No other
/// module should import `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository. Succeeding here is the repository validity
    /// check.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Clone `url` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::Internal`] with git2's message on any failure,
    /// including authentication failures for private repositories.
    pub fn clone_into(url: &str, dest: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::clone(url, dest).map_err(|e| GitError::Internal {
            message: format!("clone of {} failed: {}", url, e.message()),
        })?;
        Ok(Self { repo })
    }

    /// Get repository information (git_dir and work_dir paths).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let work_dir = self.repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(RepoInfo { git_dir, work_dir })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Commits reachable from HEAD but not from `since`, one per line.
    ///
    /// Each line is `<full sha> <summary>\n`, newest first; the same text
    /// `git log --pretty=oneline --no-decorate <since>..HEAD` prints.
    /// `since` may be a full or abbreviated SHA.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if `since` is unknown to the repository
    /// - [`GitError::RefNotFound`] if HEAD is unborn
    pub fn log_since(&self, since: &str) -> Result<String, GitError> {
        let since_commit = self
            .repo
            .revparse_single(since)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, since))?;
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let internal = |e: git2::Error| GitError::Internal {
            message: e.message().to_string(),
        };

        let mut revwalk = self.repo.revwalk().map_err(internal)?;
        revwalk
            .set_sorting(git2::Sort::TIME)
            .map_err(internal)?;
        revwalk.push(head.id()).map_err(internal)?;
        revwalk.hide(since_commit.id()).map_err(internal)?;

        let mut log = String::new();
        for oid in revwalk {
            let oid = oid.map_err(internal)?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
            log.push_str(&oid.to_string());
            log.push(' ');
            log.push_str(commit.summary().unwrap_or(""));
            log.push('\n');
        }

        Ok(log)
    }
}
