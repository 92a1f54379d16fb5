//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GENTRACK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gentrack/config.toml`
//! 3. `~/.gentrack/config.toml`
//!
//! # Repo Config
//!
//! Located at `.gentrack.toml` in the working-tree root.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g., the metadata file must
//! be a working-tree relative path outside `.git`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::RepoPath;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// cache_dir = "/var/cache/gentrack"
/// git_timeout_secs = 120
///
/// [local_sources]
/// googleapis = "/src/googleapis"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Where upstream clones are kept
    pub cache_dir: Option<PathBuf>,

    /// Timeout for git subprocesses, in seconds
    pub git_timeout_secs: Option<u64>,

    /// Local checkouts used instead of cloning, keyed by source name
    pub local_sources: BTreeMap<String, PathBuf>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "git_timeout_secs must be greater than zero".into(),
            ));
        }
        validate_source_names(&self.local_sources)
    }
}

/// Repository configuration (working-tree scope).
///
/// # Example
///
/// ```toml
/// metadata_file = "synth.metadata"
/// track_obsolete_files = true
/// write_metadata = true
/// mtime_fuzz_secs = 1
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Metadata file, relative to the working-tree root
    pub metadata_file: Option<String>,

    /// Whether obsolete generated files are removed
    pub track_obsolete_files: Option<bool>,

    /// Whether the metadata file is written at scope exit
    pub write_metadata: Option<bool>,

    /// Filesystem timestamp granularity to tolerate, in seconds
    pub mtime_fuzz_secs: Option<u64>,

    /// Timeout for git subprocesses, in seconds
    pub git_timeout_secs: Option<u64>,

    /// Local checkouts used instead of cloning, keyed by source name
    pub local_sources: BTreeMap<String, PathBuf>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(file) = &self.metadata_file {
            let path = RepoPath::new(file.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid metadata_file '{}': {}", file, e))
            })?;
            if path.is_in_git_dir() {
                return Err(ConfigError::InvalidValue(format!(
                    "metadata_file '{}' cannot live inside .git",
                    file
                )));
            }
        }

        if self.git_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "git_timeout_secs must be greater than zero".into(),
            ));
        }

        validate_source_names(&self.local_sources)
    }
}

fn validate_source_names(sources: &BTreeMap<String, PathBuf>) -> Result<(), ConfigError> {
    for name in sources.keys() {
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ConfigError::InvalidValue(format!(
                "invalid source name '{}' in local_sources",
                name
            )));
        }
    }
    Ok(())
}
