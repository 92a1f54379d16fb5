//! Integration tests for tracked generation scopes.
//!
//! Each test builds a real git working tree, runs a simulated generation
//! pass inside a scope, and checks the files on disk and the persisted
//! metadata afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use walkdir::WalkDir;

use gentrack::core::metadata::{Metadata, MetadataStore, Source};
use gentrack::sources::add_git_source_from_directory;
use gentrack::tracker::{run_tracked, ScopeOptions, TrackedScope};

// =============================================================================
// Test Fixtures
// =============================================================================

/// A git working tree to generate into.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a repository with an initial commit on main.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn metadata_path(&self) -> PathBuf {
        self.path().join("synth.metadata")
    }

    fn options(&self) -> ScopeOptions {
        ScopeOptions::new(self.path())
    }

    /// Write a file, creating parent directories.
    fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }

    /// Age every file outside `.git`, so only later writes count as touched.
    fn settle(&self) {
        let old = SystemTime::now() - Duration::from_secs(3600);
        for entry in WalkDir::new(self.path())
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let file = fs::OpenOptions::new()
                .write(true)
                .open(entry.path())
                .unwrap();
            file.set_modified(old).unwrap();
        }
    }

    /// Write a previous run's metadata recording `files`, and the files.
    fn previous_run(&self, files: &[&str]) {
        let entries: Vec<String> = files
            .iter()
            .map(|f| format!("{{\"path\": \"{}\"}}", f))
            .collect();
        fs::write(
            self.metadata_path(),
            format!("{{\"newFiles\": [{}]}}", entries.join(", ")),
        )
        .unwrap();
        for file in files {
            self.write(file, "previous");
        }
    }

    fn metadata(&self) -> Metadata {
        MetadataStore::read_or_empty(&self.metadata_path()).unwrap()
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn recorded(metadata: &Metadata) -> Vec<&str> {
    metadata.new_files.iter().map(|f| f.path.as_str()).collect()
}

// =============================================================================
// Recording generated files
// =============================================================================

#[test]
fn new_files_recorded() {
    let repo = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("code/b", "b");
        repo.write("code/a", "a");
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["code/a", "code/b"]);
}

#[test]
fn gitignored_files_not_recorded() {
    let repo = TestRepo::new();
    repo.write(".gitignore", "code/c\n");
    run_git(repo.path(), &["add", ".gitignore"]);
    run_git(repo.path(), &["commit", "-m", "ignore code/c"]);
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("code/b", "b");
        repo.write("code/c", "c");
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["code/b"]);
}

#[test]
fn modified_existing_file_recorded() {
    let repo = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("README.md", "# Regenerated\n");
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["README.md"]);
}

#[test]
fn metadata_file_never_records_itself() {
    let repo = TestRepo::new();
    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| repo.write("a", "a")).unwrap();

    // The metadata file and `a` are both fresh on the second pass.
    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| repo.write("a", "a")).unwrap();

    let metadata = repo.metadata();
    assert!(!recorded(&metadata).contains(&"synth.metadata"));
    assert!(recorded(&metadata).contains(&"a"));
}

#[test]
fn git_internal_files_not_recorded() {
    let repo = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("gen.txt", "x");
        run_git(repo.path(), &["add", "gen.txt"]);
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["gen.txt"]);
}

#[cfg(unix)]
#[test]
fn dangling_symlink_does_not_break_tracking() {
    let repo = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("real", "x");
        std::os::unix::fs::symlink(repo.path().join("missing"), repo.path().join("badlink"))
            .unwrap();
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["real"]);
}

// =============================================================================
// Removing obsolete files
// =============================================================================

#[test]
fn obsolete_file_removed() {
    let repo = TestRepo::new();
    repo.previous_run(&["code/a", "code/b"]);
    repo.settle();

    let mut store = MetadataStore::new();
    let (_, report) = run_tracked(&mut store, repo.options(), |_| repo.write("code/b", "b"))
        .unwrap();

    assert!(!repo.exists("code/a"));
    assert!(repo.exists("code/b"));
    assert_eq!(recorded(&repo.metadata()), vec!["code/b"]);
    assert_eq!(report.reconcile.unwrap().removed.len(), 1);
}

#[cfg(unix)]
#[test]
fn backslash_name_is_not_confused_with_subdirectory() {
    let repo = TestRepo::new();
    repo.write("foo/bar", "hand-written");
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| repo.write("foo\\bar", "generated")).unwrap();
    assert_eq!(recorded(&repo.metadata()), vec!["foo\\bar"]);
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| repo.write("other", "generated")).unwrap();

    assert!(repo.exists("foo/bar"), "hand-written file must survive");
    assert!(!repo.exists("foo\\bar"), "obsolete generated file must go");
    assert_eq!(recorded(&repo.metadata()), vec!["other"]);
}

#[cfg(unix)]
#[test]
fn ignored_names_with_quotes_never_recorded() {
    let repo = TestRepo::new();
    repo.write(".gitignore", "*.log\n");
    run_git(repo.path(), &["add", ".gitignore"]);
    run_git(repo.path(), &["commit", "-m", "ignore logs"]);
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("we\"ird.log", "x");
        repo.write("tab\there.log", "x");
        repo.write("gen.rs", "x");
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["gen.rs"]);
}

#[test]
fn regeneration_with_ignored_output() {
    let repo = TestRepo::new();
    repo.write(".gitignore", "code/c\n");
    run_git(repo.path(), &["add", ".gitignore"]);
    run_git(repo.path(), &["commit", "-m", "ignore code/c"]);
    repo.previous_run(&["a", "code/b"]);
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write("code/b", "b2");
        repo.write("code/c", "c");
    })
    .unwrap();

    assert_eq!(recorded(&repo.metadata()), vec!["code/b"]);
    assert!(!repo.exists("a"));
    assert!(repo.exists("code/b"));
    assert!(repo.exists("code/c"));
}

#[test]
fn legacy_generated_files_list_is_reconciled() {
    let repo = TestRepo::new();
    repo.write("old", "o");
    fs::write(
        repo.metadata_path(),
        "{\"generatedFiles\": [{\"path\": \"old\"}]}",
    )
    .unwrap();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| repo.write("new", "n")).unwrap();

    assert!(!repo.exists("old"));
    assert_eq!(recorded(&repo.metadata()), vec!["new"]);
}

#[test]
fn ignored_obsolete_file_kept() {
    let repo = TestRepo::new();
    repo.write(".gitignore", ".bin\n");
    repo.previous_run(&[".bin"]);
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| {
        repo.write(".gitignore", ".bin\n");
    })
    .unwrap();

    assert!(repo.exists(".bin"));
    assert_eq!(recorded(&repo.metadata()), vec![".gitignore"]);
}

#[test]
fn already_deleted_obsolete_file_is_fine() {
    let repo = TestRepo::new();
    repo.previous_run(&["gone"]);
    fs::remove_file(repo.path().join("gone")).unwrap();
    repo.settle();

    let mut store = MetadataStore::new();
    let (_, report) = run_tracked(&mut store, repo.options(), |_| repo.write("new", "n"))
        .unwrap();

    let reconcile = report.reconcile.unwrap();
    assert!(reconcile.is_clean());
    assert_eq!(reconcile.already_absent.len(), 1);
}

#[test]
fn tracking_disabled_leaves_files_alone() {
    let repo = TestRepo::new();
    repo.previous_run(&["code/a"]);
    repo.settle();

    let mut store = MetadataStore::new();
    store.set_track_obsolete_files(false);
    let (_, report) = run_tracked(&mut store, repo.options(), |_| repo.write("code/b", "b"))
        .unwrap();

    assert!(repo.exists("code/a"));
    assert!(report.reconcile.is_none());
    assert!(repo.metadata().new_files.is_empty());
}

#[test]
fn unparseable_previous_metadata_deletes_nothing() {
    let repo = TestRepo::new();
    repo.write("code/a", "a");
    fs::write(repo.metadata_path(), "{ not json").unwrap();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| repo.write("code/b", "b")).unwrap();

    assert!(repo.exists("code/a"));
    assert_eq!(recorded(&repo.metadata()), vec!["code/b"]);
}

#[test]
fn identical_runs_are_idempotent() {
    let repo = TestRepo::new();
    repo.settle();
    let generate = || {
        repo.write("code/a", "a");
        repo.write("code/b", "b");
    };

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |_| generate()).unwrap();
    let first = repo.metadata();

    let mut store = MetadataStore::new();
    let (_, report) = run_tracked(&mut store, repo.options(), |_| generate()).unwrap();
    let second = repo.metadata();

    assert_eq!(first.new_files, second.new_files);
    assert!(report.reconcile.unwrap().removed.is_empty());
    assert!(repo.exists("code/a"));
    assert!(repo.exists("code/b"));
}

// =============================================================================
// Scope lifecycle
// =============================================================================

#[test]
fn scope_closed_when_work_panics() {
    let repo = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _scope = TrackedScope::open(&mut store, repo.options()).unwrap();
        repo.write("partial", "p");
        panic!("generator crashed");
    }));

    assert!(result.is_err());
    assert_eq!(recorded(&repo.metadata()), vec!["partial"]);
}

#[test]
fn write_disabled_keeps_previous_metadata() {
    let repo = TestRepo::new();
    repo.previous_run(&["code/a"]);
    let before = fs::read_to_string(repo.metadata_path()).unwrap();
    repo.settle();

    let mut store = MetadataStore::new();
    store.set_track_obsolete_files(false);
    store.enable_write_metadata(false);
    run_tracked(&mut store, repo.options(), |store| {
        store.add_generator_source("gapic", "1.0.0", "");
    })
    .unwrap();

    assert_eq!(fs::read_to_string(repo.metadata_path()).unwrap(), before);
}

#[test]
fn custom_metadata_path_used() {
    let repo = TestRepo::new();
    repo.settle();
    let path = repo.path().join("gen/out.metadata");
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut store = MetadataStore::new();
    run_tracked(
        &mut store,
        repo.options().with_metadata_path(&path),
        |_| repo.write("x", "x"),
    )
    .unwrap();

    let metadata = MetadataStore::read_or_empty(&path).unwrap();
    assert_eq!(recorded(&metadata), vec!["x"]);
    assert!(!repo.metadata_path().exists());
}

#[test]
fn sources_written_in_canonical_order() {
    let repo = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    run_tracked(&mut store, repo.options(), |store| {
        store.add_template_source("python_library", "templates.gcp", "2020.1.1");
        store.add_generator_source("gapic", "1.0.0", "");
        store.add_git_source("googleapis", "https://example.com/g.git", "abc", None);
    })
    .unwrap();

    let kinds: Vec<&str> = repo
        .metadata()
        .sources
        .iter()
        .map(|s| match s {
            Source::Git(_) => "git",
            Source::Generator(_) => "generator",
            Source::Template(_) => "template",
        })
        .collect();
    assert_eq!(kinds, vec!["git", "generator", "template"]);
}

// =============================================================================
// Upstream commit logs
// =============================================================================

#[test]
fn git_log_appended_newest_first() {
    let repo = TestRepo::new();
    let upstream = TestRepo::new();
    let base = head_sha(upstream.path());

    fs::write(
        repo.metadata_path(),
        format!(
            "{{\"sources\": [{{\"git\": {{\"name\": \"tmp\", \"sha\": \"{}\"}}}}]}}",
            base
        ),
    )
    .unwrap();
    upstream.write("a", "a");
    run_git(upstream.path(), &["add", "a"]);
    run_git(upstream.path(), &["commit", "-m", "Add a"]);
    upstream.write("b", "b");
    run_git(upstream.path(), &["add", "b"]);
    run_git(upstream.path(), &["commit", "-m", "Add b"]);
    repo.settle();

    let mut store = MetadataStore::new();
    store.set_track_obsolete_files(false);
    let (_, report) = run_tracked(&mut store, repo.options(), |store| {
        add_git_source_from_directory(store, "tmp", upstream.path()).unwrap();
    })
    .unwrap();

    assert_eq!(report.logs_appended, 1);
    let metadata = repo.metadata();
    let source = metadata.git_sources().next().unwrap();
    let log = source.log.as_deref().unwrap();
    let summaries: Vec<&str> = log
        .lines()
        .map(|line| line.split_once(' ').unwrap().1)
        .collect();
    assert_eq!(summaries, vec!["Add b", "Add a"]);
    assert_eq!(source.sha, head_sha(upstream.path()));

    let raw = fs::read_to_string(repo.metadata_path()).unwrap();
    assert!(!raw.contains(upstream.path().to_str().unwrap()));
}

#[test]
fn git_source_without_previous_sha_gets_no_log() {
    let repo = TestRepo::new();
    let upstream = TestRepo::new();
    repo.settle();

    let mut store = MetadataStore::new();
    store.set_track_obsolete_files(false);
    run_tracked(&mut store, repo.options(), |store| {
        add_git_source_from_directory(store, "tmp", upstream.path()).unwrap();
    })
    .unwrap();

    let metadata = repo.metadata();
    assert!(metadata.git_sources().next().unwrap().log.is_none());
}

fn head_sha(dir: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .expect("git rev-parse failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}
