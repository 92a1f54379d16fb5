//! tracker::observer
//!
//! Change detection by timestamp scan.
//!
//! The observer records a threshold when a scope opens (now minus a fuzz
//! covering filesystem timestamp granularity). When asked, it walks the
//! working tree and reports every regular file modified at or after the
//! threshold. The scan is synchronous; no background watcher runs.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::types::RepoPath;

/// Reports files touched since it was started.
#[derive(Debug, Clone)]
pub struct ChangeObserver {
    root: PathBuf,
    threshold: SystemTime,
}

impl ChangeObserver {
    /// Start observing the tree at `root`.
    ///
    /// Files modified up to `fuzz` before this call still count as touched.
    pub fn start(root: &Path, fuzz: Duration) -> Self {
        let now = SystemTime::now();
        let threshold = now.checked_sub(fuzz).unwrap_or(SystemTime::UNIX_EPOCH);
        Self::with_threshold(root, threshold)
    }

    /// Observe with an explicit threshold.
    pub fn with_threshold(root: &Path, threshold: SystemTime) -> Self {
        Self {
            root: root.to_path_buf(),
            threshold,
        }
    }

    /// The modification time at or after which a file counts as touched.
    pub fn threshold(&self) -> SystemTime {
        self.threshold
    }

    /// Walk the tree and return touched files, sorted and deduplicated.
    ///
    /// `.git` directories are not descended into. Symlinks are resolved;
    /// a dangling link or a file that disappears mid-scan is skipped.
    pub fn touched_paths(&self) -> Vec<RepoPath> {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != ".git");

        let mut touched = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry during change scan: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            // Follows symlinks, so a link is judged by its target.
            let meta = match std::fs::metadata(path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} vanished or is a dangling link, skipping", path.display());
                    continue;
                }
                Err(e) => {
                    warn!("Could not stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }

            let modified = match meta.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    continue;
                }
            };
            if modified < self.threshold {
                continue;
            }

            match RepoPath::from_fs(&self.root, path) {
                Ok(repo_path) => touched.push(repo_path),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        touched.sort();
        touched.dedup();
        touched
    }
}
