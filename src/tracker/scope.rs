//! tracker::scope
//!
//! Scoped tracking of one generation pass.
//!
//! # Lifecycle
//!
//! [`TrackedScope::open`] loads the previous metadata snapshot and starts
//! the change observer. The scope is then `Open` until it is closed,
//! explicitly via [`TrackedScope::close`] or implicitly on drop (including
//! during unwinding). Closing runs, in order:
//!
//! 1. If obsolete-file tracking is enabled: collect touched files, drop
//!    ignored ones, record the rest as this run's generated files, and
//!    delete files the previous run generated but this one did not.
//! 2. For each git source present in both snapshots (by name), append the
//!    commit log between the previously recorded SHA and the checkout's
//!    HEAD.
//! 3. Clear every git source's local path.
//! 4. Sort sources into canonical order.
//! 5. Write the metadata file, if writing is enabled.
//!
//! # Invariants
//!
//! - The scope holds `&mut MetadataStore`, so at most one scope per store
//!   can be open at a time
//! - The close sequence runs exactly once
//! - An unreadable old snapshot is treated as empty, not as an error
//! - If ignore evaluation fails, nothing is deleted and nothing is written
//!
//! # Example
//!
//! ```no_run
//! use gentrack::core::metadata::MetadataStore;
//! use gentrack::tracker::{ScopeOptions, TrackedScope};
//! use std::path::Path;
//!
//! let mut store = MetadataStore::new();
//! let mut scope = TrackedScope::open(&mut store, ScopeOptions::new(Path::new(".")))?;
//!
//! scope.store().add_generator_source("gapic", "1.0.0", "");
//! // ... run the generator, which writes files under the tree ...
//!
//! let report = scope.close()?;
//! println!("{} generated files recorded", report.new_files);
//! # Ok::<(), gentrack::tracker::ScopeError>(())
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::ignore::{IgnoreCheck, IgnoreError, IgnoreFilter};
use super::observer::ChangeObserver;
use super::reconcile::{remove_obsolete_files, ReconcileReport};
use crate::core::config::Config;
use crate::core::metadata::{Metadata, MetadataStore, Source, StoreError, DEFAULT_METADATA_FILE};
use crate::core::types::RepoPath;
use crate::git::Git;

/// Errors from opening or closing a tracked scope.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("ignore check failed: {0}")]
    Ignore(#[from] IgnoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where and how a scope tracks.
#[derive(Debug, Clone)]
pub struct ScopeOptions {
    /// Working-tree root; all recorded paths are relative to it.
    pub root: PathBuf,
    /// Metadata file location.
    pub metadata_path: PathBuf,
    /// Filesystem timestamp granularity to tolerate.
    pub mtime_fuzz: Duration,
    /// Timeout for the ignore check.
    pub git_timeout: Duration,
}

impl ScopeOptions {
    /// Defaults for a tree at `root`: `synth.metadata`, 1s fuzz, 60s timeout.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            metadata_path: root.join(DEFAULT_METADATA_FILE),
            mtime_fuzz: Duration::from_secs(1),
            git_timeout: Duration::from_secs(60),
        }
    }

    /// Options for a tree at `root`, taken from configuration.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            metadata_path: config.metadata_path(root),
            mtime_fuzz: config.mtime_fuzz(),
            git_timeout: config.git_timeout(),
        }
    }

    /// Use a different metadata file.
    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = path.into();
        self
    }

    /// Use a different timestamp fuzz.
    pub fn with_mtime_fuzz(mut self, fuzz: Duration) -> Self {
        self.mtime_fuzz = fuzz;
        self
    }
}

/// What closing a scope did.
#[derive(Debug, Default)]
pub struct ScopeReport {
    /// Generated files recorded for this run.
    pub new_files: usize,
    /// Reconcile outcome; `None` when tracking was disabled.
    pub reconcile: Option<ReconcileReport>,
    /// Git sources that received a log.
    pub logs_appended: usize,
    /// Whether the metadata file was written.
    pub wrote_metadata: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Open,
    Closed,
}

/// A generation pass in progress.
pub struct TrackedScope<'a> {
    store: &'a mut MetadataStore,
    options: ScopeOptions,
    old_metadata: Metadata,
    observer: ChangeObserver,
    ignore: Option<IgnoreFilter>,
    state: ScopeState,
}

impl std::fmt::Debug for TrackedScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedScope")
            .field("root", &self.options.root)
            .field("metadata_path", &self.options.metadata_path)
            .field("state", &self.state)
            .finish()
    }
}

impl<'a> TrackedScope<'a> {
    /// Open a scope: load the previous snapshot and start observing.
    ///
    /// # Errors
    ///
    /// - [`ScopeError::Ignore`] if tracking is enabled and git is missing
    /// - [`ScopeError::Store`] if the old snapshot exists but cannot be read
    pub fn open(store: &'a mut MetadataStore, options: ScopeOptions) -> Result<Self, ScopeError> {
        let ignore = if store.should_track_obsolete_files() {
            Some(IgnoreFilter::locate(&options.root, options.git_timeout)?)
        } else {
            None
        };

        let old_metadata = match MetadataStore::read_or_empty(&options.metadata_path) {
            Ok(metadata) => metadata,
            Err(StoreError::Parse { path, message }) => {
                warn!(
                    "Ignoring unparseable metadata in {}: {}",
                    path.display(),
                    message
                );
                Metadata::default()
            }
            Err(e) => return Err(e.into()),
        };

        let observer = ChangeObserver::start(&options.root, options.mtime_fuzz);
        debug!("Opened tracked scope at {}", options.root.display());

        Ok(Self {
            store,
            options,
            old_metadata,
            observer,
            ignore,
            state: ScopeState::Open,
        })
    }

    /// The store being populated during this pass.
    pub fn store(&mut self) -> &mut MetadataStore {
        self.store
    }

    /// The snapshot loaded when the scope opened.
    pub fn old_metadata(&self) -> &Metadata {
        &self.old_metadata
    }

    /// Run the close sequence and consume the scope.
    pub fn close(mut self) -> Result<ScopeReport, ScopeError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<ScopeReport, ScopeError> {
        if self.state == ScopeState::Closed {
            return Ok(ScopeReport::default());
        }
        self.state = ScopeState::Closed;

        let mut report = ScopeReport::default();

        if self.store.should_track_obsolete_files() {
            let ignore = match self.ignore.take() {
                Some(ignore) => ignore,
                None => IgnoreFilter::locate(&self.options.root, self.options.git_timeout)?,
            };
            report.reconcile = Some(self.track_new_files(&ignore)?);
            report.new_files = self.store.get().new_files.len();
        }

        report.logs_appended = append_git_logs(&self.old_metadata, self.store.get_mut());

        let metadata = self.store.get_mut();
        metadata.clear_local_paths();
        metadata.sort_sources();

        if self.store.write_metadata_enabled() {
            self.store.write(&self.options.metadata_path)?;
            report.wrote_metadata = true;
        }

        debug!("Closed tracked scope at {}", self.options.root.display());
        Ok(report)
    }

    fn track_new_files(&mut self, ignore: &dyn IgnoreCheck) -> Result<ReconcileReport, ScopeError> {
        let own_files = self.own_files();
        let touched: Vec<RepoPath> = self
            .observer
            .touched_paths()
            .into_iter()
            .filter(|path| !own_files.contains(path))
            .collect();

        let tracked = ignore.filter_ignored(&touched)?;
        self.store.add_new_files(tracked);

        Ok(remove_obsolete_files(
            &self.options.root,
            &self.old_metadata,
            self.store.get(),
            ignore,
        )?)
    }

    /// The metadata file and its temp sibling, which are never generated files.
    fn own_files(&self) -> Vec<RepoPath> {
        let metadata = &self.options.metadata_path;
        let mut temp = metadata.as_os_str().to_os_string();
        temp.push(".tmp");
        [metadata.clone(), PathBuf::from(temp)]
            .iter()
            .filter_map(|path| RepoPath::from_fs(&self.options.root, path).ok())
            .collect()
    }
}

impl Drop for TrackedScope<'_> {
    fn drop(&mut self) {
        // Best-effort close when the scope was not closed explicitly
        if let Err(e) = self.finish() {
            warn!("Failed to close tracked scope: {}", e);
        }
    }
}

/// Open a scope, run `work`, and close the scope whatever `work` returns.
///
/// The close sequence also runs if `work` panics (via drop).
pub fn run_tracked<T>(
    store: &mut MetadataStore,
    options: ScopeOptions,
    work: impl FnOnce(&mut MetadataStore) -> T,
) -> Result<(T, ScopeReport), ScopeError> {
    let mut scope = TrackedScope::open(store, options)?;
    let output = work(scope.store());
    let report = scope.close()?;
    Ok((output, report))
}

/// Append commit logs to git sources that also appear in `old`.
///
/// Returns how many sources received a log. Sources without a recorded
/// old SHA or without a local path are skipped; a failing log query is
/// logged and skipped.
fn append_git_logs(old: &Metadata, new: &mut Metadata) -> usize {
    let old_map = old.git_source_map();
    let mut appended = 0;

    for source in &mut new.sources {
        let Source::Git(git_source) = source else {
            continue;
        };
        let Some(old_source) = old_map.get(git_source.name.as_str()) else {
            continue;
        };
        if old_source.sha.is_empty() {
            continue;
        }
        let Some(local_path) = git_source.local_path.as_deref() else {
            continue;
        };

        match Git::open(local_path).and_then(|git| git.log_since(&old_source.sha)) {
            Ok(log) => {
                git_source.log = (!log.is_empty()).then_some(log);
                appended += 1;
            }
            Err(e) => warn!(
                "Could not read git log for source {} since {}: {}",
                git_source.name, old_source.sha, e
            ),
        }
    }

    appended
}
