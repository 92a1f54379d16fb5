//! tracker::ignore
//!
//! Version-control ignore filtering.
//!
//! All candidate paths go to a single `git check-ignore -z --stdin`
//! invocation, NUL-delimited both ways so git neither quotes nor unquotes
//! names containing `"`, `\` or control characters. Paths with a `.git`
//! segment are removed before git is asked, since `check-ignore` does not
//! exclude them itself.

use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::core::types::RepoPath;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from ignore evaluation.
#[derive(Debug, Error)]
pub enum IgnoreError {
    /// The git binary is not on `PATH`.
    #[error("could not find git in PATH: {0}")]
    ToolMissing(String),

    #[error("failed to run git check-ignore: {0}")]
    Spawn(#[from] io::Error),

    #[error("git check-ignore timed out after {0:?}")]
    Timeout(Duration),

    #[error("git check-ignore exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Something that can drop ignored paths from a candidate list.
///
/// Implementations must never return a path inside a `.git` directory.
pub trait IgnoreCheck {
    /// Return the candidates that are not ignored, in input order.
    fn filter_ignored(&self, paths: &[RepoPath]) -> Result<Vec<RepoPath>, IgnoreError>;
}

/// Ignore filter backed by the installed `git`.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    git: PathBuf,
    root: PathBuf,
    timeout: Duration,
}

impl IgnoreFilter {
    /// Locate `git` on `PATH` and build a filter for the tree at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`IgnoreError::ToolMissing`] if git cannot be found.
    pub fn locate(root: &Path, timeout: Duration) -> Result<Self, IgnoreError> {
        let git = which::which("git").map_err(|e| IgnoreError::ToolMissing(e.to_string()))?;
        Ok(Self::with_git_binary(git, root, timeout))
    }

    /// Build a filter around a specific git binary.
    pub fn with_git_binary(git: PathBuf, root: &Path, timeout: Duration) -> Self {
        Self {
            git,
            root: root.to_path_buf(),
            timeout,
        }
    }

    fn run_check_ignore(&self, input: String) -> Result<String, IgnoreError> {
        let mut child = Command::new(&self.git)
            .args(["check-ignore", "-z", "--stdin"])
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child.stdin.take();
        let writer = thread::spawn(move || -> io::Result<()> {
            if let Some(stdin) = stdin.as_mut() {
                stdin.write_all(input.as_bytes())?;
            }
            // Dropping stdin closes the pipe so git sees EOF.
            drop(stdin);
            Ok(())
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout)?;

        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        // 0: some paths ignored, 1: none ignored, anything else is fatal.
        match status.code() {
            Some(0) | Some(1) => {
                // A failed write means git answered without seeing every path.
                written?;
                Ok(stdout)
            }
            _ => Err(IgnoreError::Failed {
                status,
                stderr: stderr.trim().to_string(),
            }),
        }
    }
}

impl IgnoreCheck for IgnoreFilter {
    fn filter_ignored(&self, paths: &[RepoPath]) -> Result<Vec<RepoPath>, IgnoreError> {
        let candidates: Vec<&RepoPath> = paths.iter().filter(|p| !p.is_in_git_dir()).collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut input = String::new();
        for path in &candidates {
            input.push_str(path.as_str());
            input.push('\0');
        }

        let output = self.run_check_ignore(input)?;
        let ignored = parse_ignored(&output);
        debug!(
            "git check-ignore: {} of {} paths ignored",
            ignored.len(),
            candidates.len()
        );

        Ok(candidates
            .into_iter()
            .filter(|path| !ignored.contains(*path))
            .cloned()
            .collect())
    }
}

/// Parse NUL-delimited `check-ignore -z` output into normalized paths.
fn parse_ignored(output: &str) -> HashSet<RepoPath> {
    output
        .split('\0')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| RepoPath::new(entry).ok())
        .collect()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            if pipe.read_to_end(&mut bytes).is_ok() {
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        text
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, IgnoreError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(IgnoreError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
