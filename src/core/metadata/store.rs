//! core::metadata::store
//!
//! In-process metadata record and its on-disk persistence.
//!
//! # Architecture
//!
//! `MetadataStore` is an explicit context object: one per logical run,
//! passed by `&mut` to whoever needs to record provenance. Resetting means
//! starting over with empty metadata. The two toggles (obsolete-file
//! tracking and metadata writing) live on the store and survive `reset`.
//!
//! Only the scope controller finalizes the record (clears local paths,
//! sorts sources, writes the file).
//!
//! # Example
//!
//! ```no_run
//! use gentrack::core::metadata::store::MetadataStore;
//! use std::path::Path;
//!
//! let mut store = MetadataStore::new();
//! store.add_generator_source("gapic-generator", "1.2.3", "gcr.io/gapic");
//! store.write(Path::new("synth.metadata"))?;
//!
//! let again = MetadataStore::read_or_empty(Path::new("synth.metadata"))?;
//! assert_eq!(again.sources.len(), 1);
//! # Ok::<(), gentrack::core::metadata::StoreError>(())
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::schema::{
    parse_metadata, ClientDestination, Destination, GeneratedFile, GeneratorSource, GitSource,
    Metadata, MetadataError, Source, TemplateSource,
};
use crate::core::types::{RepoPath, UtcTimestamp};

/// Default metadata filename at the working-tree root.
pub const DEFAULT_METADATA_FILE: &str = "synth.metadata";

/// Errors from metadata persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file exists but is not valid metadata.
    #[error("failed to parse metadata file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to read metadata file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write metadata file '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

/// The metadata being built during a run, plus the run-wide toggles.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    metadata: Metadata,
    track_obsolete_files: bool,
    write_enabled: bool,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    /// Create a store with empty metadata, tracking and writing enabled.
    pub fn new() -> Self {
        Self {
            metadata: Metadata::default(),
            track_obsolete_files: true,
            write_enabled: true,
        }
    }

    /// Discard everything recorded so far.
    pub fn reset(&mut self) {
        self.metadata = Metadata::default();
    }

    /// Current metadata.
    pub fn get(&self) -> &Metadata {
        &self.metadata
    }

    /// Current metadata, mutably.
    pub fn get_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Append a git source. Repeated calls append repeated entries.
    pub fn add_git_source(
        &mut self,
        name: impl Into<String>,
        remote: impl Into<String>,
        sha: impl Into<String>,
        local_path: Option<PathBuf>,
    ) {
        self.metadata.sources.push(Source::Git(GitSource {
            name: name.into(),
            remote: remote.into(),
            sha: sha.into(),
            log: None,
            local_path,
        }));
    }

    /// Append a generator source.
    pub fn add_generator_source(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        docker_image: impl Into<String>,
    ) {
        self.metadata
            .sources
            .push(Source::Generator(GeneratorSource {
                name: name.into(),
                version: version.into(),
                docker_image: docker_image.into(),
            }));
    }

    /// Append a template source.
    pub fn add_template_source(
        &mut self,
        name: impl Into<String>,
        origin: impl Into<String>,
        version: impl Into<String>,
    ) {
        self.metadata.sources.push(Source::Template(TemplateSource {
            name: name.into(),
            origin: origin.into(),
            version: version.into(),
        }));
    }

    /// Append a client library destination.
    pub fn add_client_destination(&mut self, destination: ClientDestination) {
        self.metadata
            .destinations
            .push(Destination::Client(destination));
    }

    /// Record generated files for this run.
    ///
    /// Paths inside a `.git` directory are dropped.
    pub fn add_new_files(&mut self, paths: impl IntoIterator<Item = RepoPath>) {
        for path in paths {
            if path.is_in_git_dir() {
                continue;
            }
            self.metadata.new_files.push(GeneratedFile {
                path: path.into(),
            });
        }
    }

    /// Read a metadata file, or return empty metadata if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Parse`] if the file exists but is not valid metadata
    /// - [`StoreError::Read`] for any other I/O failure
    pub fn read_or_empty(path: &Path) -> Result<Metadata, StoreError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Metadata::default()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        parse_metadata(&text).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Stamp the update time and write the metadata to `path`.
    ///
    /// Does nothing when writing is disabled. Overwrites any existing
    /// file atomically (temp file, then rename).
    pub fn write(&mut self, path: &Path) -> Result<(), StoreError> {
        if !self.write_enabled {
            debug!("Metadata writing disabled, skipping {}", path.display());
            return Ok(());
        }

        self.metadata.update_time = Some(UtcTimestamp::now());
        let mut json = self.metadata.to_json()?;
        json.push('\n');

        let write_err = |source: io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        fs::rename(&temp_path, path).map_err(write_err)?;

        debug!("Wrote metadata to {}", path.display());
        Ok(())
    }

    /// Turn obsolete-file tracking on or off.
    pub fn set_track_obsolete_files(&mut self, track: bool) {
        self.track_obsolete_files = track;
    }

    /// Whether obsolete files are tracked and removed.
    pub fn should_track_obsolete_files(&self) -> bool {
        self.track_obsolete_files
    }

    /// Turn metadata writing on or off.
    ///
    /// Disable while composing several tracked scopes so only the outermost
    /// pass produces a file.
    pub fn enable_write_metadata(&mut self, enabled: bool) {
        self.write_enabled = enabled;
    }

    /// Whether [`write`](Self::write) persists anything.
    pub fn write_metadata_enabled(&self) -> bool {
        self.write_enabled
    }
}
