//! sources
//!
//! Upstream checkouts recorded as git sources.
//!
//! A generation pass usually reads from one or more upstream repositories
//! (API definitions, shared templates). [`SourceCache::fetch`] makes each
//! one available locally, cloning it once per process, and records it in
//! the metadata store with its local path so the scope can append the
//! commit log when it closes.
//!
//! A configured local checkout (`[local_sources]` in config, or the
//! `GENTRACK_SOURCE_<NAME>` environment variable) always wins over
//! cloning.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::Config;
use crate::core::metadata::MetadataStore;
use crate::git::{Git, GitError};

/// Errors from fetching or recording an upstream.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("failed to clone {name} from {url}: {source}")]
    Clone {
        name: String,
        url: String,
        #[source]
        source: GitError,
    },

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An upstream repository to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Source name as recorded in metadata.
    pub name: String,
    /// Clone URL.
    pub url: String,
}

impl Upstream {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Record the git repository at `dir` as a source named `name`.
///
/// Reads the `origin` URL (empty when there is no `origin`) and the HEAD
/// SHA, and keeps `dir` as the source's local path.
///
/// # Errors
///
/// - [`GitError::NotARepo`] if `dir` is not inside a git working tree
/// - [`GitError::RefNotFound`] if the repository has no commits
pub fn add_git_source_from_directory(
    store: &mut MetadataStore,
    name: &str,
    dir: &Path,
) -> Result<(), SourceError> {
    let git = Git::open(dir)?;
    let remote = git.remote_url("origin")?.unwrap_or_default();
    let sha = git.head_oid()?;

    debug!("Recording git source {} at {} ({})", name, dir.display(), sha.short(7));
    store.add_git_source(name, remote, sha.as_str(), Some(dir.to_path_buf()));
    Ok(())
}

/// Memoized upstream checkouts for one process.
#[derive(Debug)]
pub struct SourceCache {
    cache_dir: PathBuf,
    fetched: HashMap<String, PathBuf>,
}

impl SourceCache {
    /// A cache that clones under `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            fetched: HashMap::new(),
        }
    }

    /// A cache rooted at the configured cache directory.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_dir())
    }

    /// Where `upstream` is cloned when no local checkout is configured.
    pub fn clone_dir(&self, upstream: &Upstream) -> PathBuf {
        let digest = hex::encode(Sha256::digest(upstream.url.as_bytes()));
        self.cache_dir
            .join(format!("{}-{}", upstream.name, &digest[..12]))
    }

    /// Make `upstream` available locally and record it as a git source.
    ///
    /// `local` replaces cloning when given. A second fetch of the same
    /// name returns the first result and records nothing.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Clone`] if cloning fails
    /// - [`SourceError::Git`] if the checkout cannot be inspected
    /// - [`SourceError::Io`] if the cache directory cannot be created
    pub fn fetch(
        &mut self,
        store: &mut MetadataStore,
        upstream: &Upstream,
        local: Option<PathBuf>,
    ) -> Result<PathBuf, SourceError> {
        if let Some(path) = self.fetched.get(&upstream.name) {
            return Ok(path.clone());
        }

        let path = match local {
            Some(dir) => {
                info!("Using local checkout of {} at {}", upstream.name, dir.display());
                dir
            }
            None => self.clone_or_reuse(upstream)?,
        };

        add_git_source_from_directory(store, &upstream.name, &path)?;
        self.fetched.insert(upstream.name.clone(), path.clone());
        Ok(path)
    }

    /// [`fetch`](Self::fetch), taking the local checkout from configuration.
    pub fn fetch_configured(
        &mut self,
        store: &mut MetadataStore,
        upstream: &Upstream,
        config: &Config,
    ) -> Result<PathBuf, SourceError> {
        let local = config.local_source(&upstream.name);
        self.fetch(store, upstream, local)
    }

    fn clone_or_reuse(&self, upstream: &Upstream) -> Result<PathBuf, SourceError> {
        let dest = self.clone_dir(upstream);
        if Git::open(&dest).is_ok() {
            debug!("Reusing clone of {} at {}", upstream.name, dest.display());
            return Ok(dest);
        }

        fs::create_dir_all(&self.cache_dir).map_err(|source| SourceError::Io {
            path: self.cache_dir.clone(),
            source,
        })?;

        info!("Cloning {} from {}...", upstream.name, upstream.url);
        Git::clone_into(&upstream.url, &dest).map_err(|source| SourceError::Clone {
            name: upstream.name.clone(),
            url: upstream.url.clone(),
            source,
        })?;
        Ok(dest)
    }
}
