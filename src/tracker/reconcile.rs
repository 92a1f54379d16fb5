//! tracker::reconcile
//!
//! Obsolete-file removal.
//!
//! A file is obsolete when the previous run recorded it as generated and
//! the current run did not. Obsolete files pass through the ignore filter
//! once more before deletion, so a path that was recorded by mistake and
//! is now ignored (or sits under `.git`) is left alone.
//!
//! Deletion is best-effort: a file that is already gone counts as
//! removed, and any other failure is logged and collected without
//! stopping the remaining deletions.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

use super::ignore::{IgnoreCheck, IgnoreError};
use crate::core::metadata::Metadata;
use crate::core::types::RepoPath;

/// A single obsolete file that could not be deleted.
#[derive(Debug)]
pub struct DeletionFailure {
    pub path: RepoPath,
    pub error: io::Error,
}

/// What a reconcile pass did.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Files deleted.
    pub removed: Vec<RepoPath>,
    /// Obsolete files that were already absent.
    pub already_absent: Vec<RepoPath>,
    /// Obsolete files kept because they are ignored or under `.git`.
    pub kept_ignored: Vec<RepoPath>,
    /// Files whose deletion failed.
    pub failures: Vec<DeletionFailure>,
}

impl ReconcileReport {
    /// True when every obsolete file is gone or deliberately kept.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Paths recorded in `old` but not in `new`.
///
/// Recorded paths that are not valid working-tree paths are dropped with
/// a warning; they are never deleted.
pub fn obsolete_files(old: &BTreeSet<String>, new: &BTreeSet<String>) -> Vec<RepoPath> {
    old.difference(new)
        .filter_map(|path| match RepoPath::new(path.as_str()) {
            Ok(repo_path) => Some(repo_path),
            Err(e) => {
                warn!("Ignoring recorded path '{}': {}", path, e);
                None
            }
        })
        .collect()
}

/// Delete files generated by the previous run but not by this one.
///
/// `new` must already hold this run's generated files, or every file
/// from the previous run is treated as obsolete.
///
/// # Errors
///
/// Only ignore evaluation can fail the pass; deletion failures are
/// reported in [`ReconcileReport::failures`].
pub fn remove_obsolete_files(
    root: &Path,
    old: &Metadata,
    new: &Metadata,
    ignore: &dyn IgnoreCheck,
) -> Result<ReconcileReport, IgnoreError> {
    let obsolete = obsolete_files(&old.new_file_paths(), &new.new_file_paths());

    let mut report = ReconcileReport::default();
    if obsolete.is_empty() {
        return Ok(report);
    }

    let (git_internal, candidates): (Vec<RepoPath>, Vec<RepoPath>) =
        obsolete.into_iter().partition(RepoPath::is_in_git_dir);
    report.kept_ignored.extend(git_internal);

    let deletable = ignore.filter_ignored(&candidates)?;
    let deletable_set: BTreeSet<&RepoPath> = deletable.iter().collect();
    report.kept_ignored.extend(
        candidates
            .iter()
            .filter(|path| !deletable_set.contains(path))
            .cloned(),
    );

    for path in deletable {
        if path.is_in_git_dir() {
            report.kept_ignored.push(path);
            continue;
        }
        info!("Removing obsolete file {}...", path);
        match fs::remove_file(path.to_fs_path(root)) {
            Ok(()) => report.removed.push(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.already_absent.push(path),
            Err(e) => {
                warn!("Failed to remove obsolete file {}: {}", path, e);
                report.failures.push(DeletionFailure { path, error: e });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::GeneratedFile;
    use std::collections::HashSet;
    use tempfile::TempDir;

    /// Treats a fixed set of paths as ignored.
    struct FixedIgnores(HashSet<String>);

    impl FixedIgnores {
        fn new(ignored: &[&str]) -> Self {
            Self(ignored.iter().map(|s| s.to_string()).collect())
        }
    }

    impl IgnoreCheck for FixedIgnores {
        fn filter_ignored(&self, paths: &[RepoPath]) -> Result<Vec<RepoPath>, IgnoreError> {
            Ok(paths
                .iter()
                .filter(|p| !self.0.contains(p.as_str()))
                .cloned()
                .collect())
        }
    }

    fn metadata(files: &[&str]) -> Metadata {
        Metadata {
            new_files: files
                .iter()
                .map(|f| GeneratedFile {
                    path: f.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn touch(root: &Path, path: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, path).unwrap();
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn obsolete_is_set_difference() {
        let obsolete = obsolete_files(&set(&["a", "code/b", "code/c"]), &set(&["code/b"]));
        let names: Vec<_> = obsolete.iter().map(RepoPath::as_str).collect();
        assert_eq!(names, vec!["a", "code/c"]);
    }

    #[test]
    fn invalid_recorded_paths_never_obsolete() {
        let obsolete = obsolete_files(&set(&["../escape", "/abs", "ok"]), &set(&[]));
        let names: Vec<_> = obsolete.iter().map(RepoPath::as_str).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn removes_obsolete_and_keeps_current() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a");
        touch(dir.path(), "code/b");

        let report = remove_obsolete_files(
            dir.path(),
            &metadata(&["a", "code/b"]),
            &metadata(&["code/b"]),
            &FixedIgnores::new(&[]),
        )
        .unwrap();

        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("code/b").exists());
        assert_eq!(report.removed.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn ignored_obsolete_file_kept() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".bin");

        let report = remove_obsolete_files(
            dir.path(),
            &metadata(&[".bin"]),
            &metadata(&[".gitignore"]),
            &FixedIgnores::new(&[".bin"]),
        )
        .unwrap();

        assert!(dir.path().join(".bin").exists());
        assert_eq!(report.kept_ignored[0].as_str(), ".bin");
        assert!(report.removed.is_empty());
    }

    #[test]
    fn git_dir_never_deleted_even_if_filter_allows() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".git/config");

        let report = remove_obsolete_files(
            dir.path(),
            &metadata(&[".git/config"]),
            &metadata(&[]),
            &FixedIgnores::new(&[]),
        )
        .unwrap();

        assert!(dir.path().join(".git/config").exists());
        assert_eq!(report.kept_ignored.len(), 1);
    }

    #[test]
    fn already_absent_is_success() {
        let dir = TempDir::new().unwrap();

        let report = remove_obsolete_files(
            dir.path(),
            &metadata(&["gone"]),
            &metadata(&[]),
            &FixedIgnores::new(&[]),
        )
        .unwrap();

        assert_eq!(report.already_absent.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn failure_does_not_stop_remaining_deletions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("adir")).unwrap();
        touch(dir.path(), "b");

        let report = remove_obsolete_files(
            dir.path(),
            &metadata(&["adir", "b"]),
            &metadata(&[]),
            &FixedIgnores::new(&[]),
        )
        .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path.as_str(), "adir");
        assert!(dir.path().join("adir").exists());
        assert!(!dir.path().join("b").exists());
    }

    #[test]
    fn nothing_obsolete_skips_filter() {
        struct Exploding;
        impl IgnoreCheck for Exploding {
            fn filter_ignored(&self, _: &[RepoPath]) -> Result<Vec<RepoPath>, IgnoreError> {
                Err(IgnoreError::ToolMissing("not expected".into()))
            }
        }

        let dir = TempDir::new().unwrap();
        let report =
            remove_obsolete_files(dir.path(), &metadata(&["a"]), &metadata(&["a"]), &Exploding)
                .unwrap();
        assert!(report.removed.is_empty());
    }
}
