//! git
//!
//! Single interface for repository queries.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to `git2`. Repository validity
//! checks, remote URLs, HEAD resolution, commit logs and clones all flow
//! through [`Git`]. No other module should import `git2`.
//!
//! The one exception to going through `git2` is ignore evaluation, which
//! shells out to `git check-ignore` in [`crate::tracker::ignore`] so the
//! exact rules of the installed git apply.
//!
//! # Example
//!
//! ```ignore
//! use gentrack::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/src/googleapis"))?;
//! let remote = git.remote_url("origin")?;
//! let head = git.head_oid()?;
//! let log = git.log_since("0123abcd")?;
//! ```

mod interface;

pub use interface::{Git, GitError, RepoInfo};
