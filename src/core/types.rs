//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`RepoPath`] - Working-tree relative path with forward-slash separators
//! - [`Oid`] - Git object identifier (SHA)
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. A `RepoPath` can
//! never escape the working tree, so nothing built from one can delete a
//! file outside it.
//!
//! # Examples
//!
//! ```
//! use gentrack::core::types::{Oid, RepoPath};
//!
//! let path = RepoPath::new("./code/b.py").unwrap();
//! assert_eq!(path.as_str(), "code/b.py");
//!
//! assert!(RepoPath::new("../outside").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository path: {0}")]
    InvalidPath(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// A path relative to the working-tree root.
///
/// Separators are always `/`, the form git speaks on stdin and the form
/// persisted to metadata. `\` is only a separator on hosts that use it as
/// one; elsewhere it is an ordinary file-name character.
///
/// Rules:
/// - Cannot be empty
/// - Cannot be absolute
/// - Cannot contain `..` segments
/// - Leading `./` and empty segments are dropped
///
/// # Example
///
/// ```
/// use gentrack::core::types::RepoPath;
///
/// let path = RepoPath::new("./code//gen/a.rs").unwrap();
/// assert_eq!(path.as_str(), "code/gen/a.rs");
///
/// let inside_git = RepoPath::new(".git/config").unwrap();
/// assert!(inside_git.is_in_git_dir());
///
/// assert!(RepoPath::new("").is_err());
/// assert!(RepoPath::new("/etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a new normalized repository path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if the path is empty, absolute, or
    /// climbs out of the working tree.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let raw = path.into();
        let slashed = to_git_slashes(&raw);

        if slashed.starts_with('/') || has_drive_prefix(&slashed) {
            return Err(TypeError::InvalidPath(format!(
                "'{}' is absolute, expected a working-tree relative path",
                raw
            )));
        }

        let mut segments = Vec::new();
        for segment in slashed.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(TypeError::InvalidPath(format!(
                        "'{}' contains a '..' segment",
                        raw
                    )))
                }
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return Err(TypeError::InvalidPath("path cannot be empty".into()));
        }

        Ok(Self(segments.join("/")))
    }

    /// Build a repository path from `path`, which must live under `root`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if `path` is not under `root` or a
    /// component is not valid UTF-8.
    pub fn from_fs(root: &Path, path: &Path) -> Result<Self, TypeError> {
        let relative = path.strip_prefix(root).map_err(|_| {
            TypeError::InvalidPath(format!(
                "'{}' is not under '{}'",
                path.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        TypeError::InvalidPath(format!(
                            "'{}' is not valid UTF-8",
                            relative.display()
                        ))
                    })?;
                    segments.push(part.to_string());
                }
                Component::CurDir => {}
                _ => {
                    return Err(TypeError::InvalidPath(format!(
                        "'{}' is not a plain relative path",
                        relative.display()
                    )))
                }
            }
        }

        Self::new(segments.join("/"))
    }

    /// Check whether any segment is `.git`.
    ///
    /// Paths inside a `.git` directory are never tracked or deleted.
    pub fn is_in_git_dir(&self) -> bool {
        self.0.split('/').any(|segment| segment == ".git")
    }

    /// Resolve this path against a working-tree root.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut full = root.to_path_buf();
        for segment in self.0.split('/') {
            full.push(segment);
        }
        full
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(windows)]
fn to_git_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(not(windows))]
fn to_git_slashes(path: &str) -> String {
    path.to_string()
}

#[cfg(windows)]
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(not(windows))]
fn has_drive_prefix(_path: &str) -> bool {
    false
}

impl TryFrom<String> for RepoPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use gentrack::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters. If `len` exceeds the OID length,
    /// returns the full OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp, serialized as RFC3339.
///
/// # Example
///
/// ```
/// use gentrack::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Current time: {}", now);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
