//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! gentrack has two configuration scopes:
//! - **Global**: User-level settings (clone cache, local checkouts)
//! - **Repo**: Working-tree settings (metadata file, tracking toggles)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. Environment (`GENTRACK_SOURCE_<NAME>` for local checkouts)
//! 5. CLI flags (not handled here)
//!
//! # Example
//!
//! ```no_run
//! use gentrack::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/repo"))).unwrap();
//! let config = result.config;
//!
//! println!("Metadata file: {}", config.metadata_file());
//! println!("Track obsolete files: {}", config.track_obsolete_files());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::metadata::DEFAULT_METADATA_FILE;

/// Name of the repo config file at the working-tree root.
pub const REPO_CONFIG_FILE: &str = ".gentrack.toml";

/// Prefix of the per-source local checkout environment override.
pub const SOURCE_ENV_PREFIX: &str = "GENTRACK_SOURCE_";

const DEFAULT_GIT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MTIME_FUZZ_SECS: u64 = 1;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence rules. Repo config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if present)
    pub repo: Option<RepoConfig>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `repo_root` is provided, also loads `<repo_root>/.gentrack.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or
    /// contain invalid values. Missing config files are not an error.
    pub fn load(repo_root: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let global = Self::load_global()?;
        let repo = match repo_root {
            Some(root) => Self::load_repo(root)?,
            None => None,
        };
        Self::from_parts(global, repo)
    }

    /// Merge already-parsed configs, validating both.
    pub fn from_parts(
        global: GlobalConfig,
        repo: Option<RepoConfig>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        let config = Config { global, repo };
        let warnings = config.missing_local_sources();
        Ok(ConfigLoadResult { config, warnings })
    }

    fn load_global() -> Result<GlobalConfig, ConfigError> {
        // 1. Check $GENTRACK_CONFIG
        if let Ok(path) = std::env::var("GENTRACK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return read_toml(&path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/gentrack/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("gentrack/config.toml");
            if path.exists() {
                return read_toml(&path);
            }
        }

        // 3. Check ~/.gentrack/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".gentrack/config.toml");
            if path.exists() {
                return read_toml(&path);
            }
        }

        Ok(GlobalConfig::default())
    }

    fn load_repo(root: &Path) -> Result<Option<RepoConfig>, ConfigError> {
        let path = root.join(REPO_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_toml(&path).map(Some)
    }

    fn missing_local_sources(&self) -> Vec<ConfigWarning> {
        let repo_sources = self.repo.iter().flat_map(|r| r.local_sources.values());
        self.global
            .local_sources
            .values()
            .chain(repo_sources)
            .filter(|path| !path.exists())
            .map(|path| ConfigWarning {
                message: "configured local source does not exist".into(),
                path: path.clone(),
            })
            .collect()
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Metadata filename, relative to the working-tree root.
    ///
    /// Defaults to `synth.metadata`.
    pub fn metadata_file(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.metadata_file.as_deref())
            .unwrap_or(DEFAULT_METADATA_FILE)
    }

    /// Absolute metadata path for a working tree.
    pub fn metadata_path(&self, root: &Path) -> PathBuf {
        root.join(self.metadata_file())
    }

    /// Whether obsolete files are tracked. Defaults to `true`.
    pub fn track_obsolete_files(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.track_obsolete_files)
            .unwrap_or(true)
    }

    /// Whether metadata is written at scope exit. Defaults to `true`.
    pub fn write_metadata(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.write_metadata)
            .unwrap_or(true)
    }

    /// Timestamp granularity tolerated by the change scan. Defaults to 1s.
    pub fn mtime_fuzz(&self) -> Duration {
        let secs = self
            .repo
            .as_ref()
            .and_then(|r| r.mtime_fuzz_secs)
            .unwrap_or(DEFAULT_MTIME_FUZZ_SECS);
        Duration::from_secs(secs)
    }

    /// Timeout for git subprocesses. Defaults to 60s.
    pub fn git_timeout(&self) -> Duration {
        let secs = self
            .repo
            .as_ref()
            .and_then(|r| r.git_timeout_secs)
            .or(self.global.git_timeout_secs)
            .unwrap_or(DEFAULT_GIT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Directory holding upstream clones.
    ///
    /// Defaults to `<user cache dir>/gentrack`, or the system temp dir
    /// when no cache dir is known.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.global.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("gentrack")
    }

    /// Local checkout to use instead of cloning `name`, if any.
    ///
    /// `GENTRACK_SOURCE_<NAME>` wins over repo config, which wins over
    /// global config. `<NAME>` is upper-cased with `-` replaced by `_`.
    pub fn local_source(&self, name: &str) -> Option<PathBuf> {
        if let Ok(value) = std::env::var(source_env_var(name)) {
            if !value.is_empty() {
                return Some(expand_home(&value));
            }
        }
        self.repo
            .as_ref()
            .and_then(|r| r.local_sources.get(name))
            .or_else(|| self.global.local_sources.get(name))
            .cloned()
    }
}

/// Environment variable naming the local checkout for `name`.
///
/// # Example
///
/// ```
/// use gentrack::core::config::source_env_var;
///
/// assert_eq!(source_env_var("googleapis-private"), "GENTRACK_SOURCE_GOOGLEAPIS_PRIVATE");
/// ```
pub fn source_env_var(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", SOURCE_ENV_PREFIX, suffix)
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
