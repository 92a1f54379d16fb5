//! core::metadata::schema
//!
//! Persisted metadata schema.
//!
//! # Schema Design
//!
//! The metadata file records where generated content came from (sources),
//! where it is published (destinations), and which files a generation pass
//! produced (`newFiles`). Field names are lowerCamelCase on disk.
//!
//! - Sources are a tagged union: exactly one of `git`, `generator`, `template`
//! - Empty strings and empty lists are omitted when serializing
//! - Unknown fields are rejected when parsing
//! - `GitSource::local_path` is transient and never serialized
//!
//! # Example
//!
//! ```
//! use gentrack::core::metadata::schema::{parse_metadata, Metadata, Source, GitSource};
//!
//! let mut meta = Metadata::default();
//! meta.sources.push(Source::Git(GitSource {
//!     name: "googleapis".into(),
//!     remote: "https://github.com/googleapis/googleapis.git".into(),
//!     sha: "abc123".into(),
//!     ..Default::default()
//! }));
//!
//! let json = meta.to_json().unwrap();
//! assert!(json.contains("\"git\""));
//! let parsed = parse_metadata(&json).unwrap();
//! assert_eq!(parsed, meta);
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::UtcTimestamp;

/// Errors from metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse metadata: {0}")]
    ParseError(String),

    #[error("failed to serialize metadata: {0}")]
    SerializeError(String),
}

/// Parse metadata JSON.
///
/// # Errors
///
/// Returns `MetadataError::ParseError` if the text is not JSON or does not
/// match the schema (including unknown fields).
pub fn parse_metadata(json: &str) -> Result<Metadata, MetadataError> {
    serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string()))
}

/// Root metadata record for one working tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Metadata {
    /// When the file was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<UtcTimestamp>,

    /// Provenance records, in insertion order until sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// Publish targets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,

    /// Files produced by the last generation pass, post ignore-filter.
    ///
    /// Older files name this list `generatedFiles`; it is read as the same.
    #[serde(default, alias = "generatedFiles", skip_serializing_if = "Vec::is_empty")]
    pub new_files: Vec<GeneratedFile>,
}

impl Metadata {
    /// Render as pretty-printed JSON with fields in schema order.
    pub fn to_json(&self) -> Result<String, MetadataError> {
        serde_json::to_string_pretty(self).map_err(|e| MetadataError::SerializeError(e.to_string()))
    }

    /// Paths of all recorded generated files.
    pub fn new_file_paths(&self) -> BTreeSet<String> {
        self.new_files.iter().map(|f| f.path.clone()).collect()
    }

    /// Iterate over the git sources.
    pub fn git_sources(&self) -> impl Iterator<Item = &GitSource> {
        self.sources.iter().filter_map(|source| match source {
            Source::Git(git) => Some(git),
            _ => None,
        })
    }

    /// Map git source name to source.
    ///
    /// When a name repeats, the last entry wins.
    pub fn git_source_map(&self) -> BTreeMap<&str, &GitSource> {
        self.git_sources().map(|git| (git.name.as_str(), git)).collect()
    }

    /// Drop the transient local path from every git source.
    pub fn clear_local_paths(&mut self) {
        for source in &mut self.sources {
            if let Source::Git(git) = source {
                git.local_path = None;
            }
        }
    }

    /// Sort sources into canonical order.
    ///
    /// Git sources first, then generators, then templates; within a kind,
    /// lexicographically by the kind's natural key.
    pub fn sort_sources(&mut self) {
        self.sources.sort_by(Source::canonical_cmp);
    }
}

/// A provenance record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    Git(GitSource),
    Generator(GeneratorSource),
    Template(TemplateSource),
}

impl Source {
    fn kind_rank(&self) -> u8 {
        match self {
            Source::Git(_) => 0,
            Source::Generator(_) => 1,
            Source::Template(_) => 2,
        }
    }

    fn natural_key(&self) -> (&str, &str, &str) {
        match self {
            Source::Git(g) => (g.name.as_str(), g.remote.as_str(), g.sha.as_str()),
            Source::Generator(g) => (
                g.name.as_str(),
                g.version.as_str(),
                g.docker_image.as_str(),
            ),
            Source::Template(t) => (t.name.as_str(), t.origin.as_str(), t.version.as_str()),
        }
    }

    /// Total order used by [`Metadata::sort_sources`].
    pub fn canonical_cmp(a: &Source, b: &Source) -> Ordering {
        a.kind_rank()
            .cmp(&b.kind_rank())
            .then_with(|| a.natural_key().cmp(&b.natural_key()))
    }

    /// The source's name, whatever its kind.
    pub fn name(&self) -> &str {
        match self {
            Source::Git(g) => &g.name,
            Source::Generator(g) => &g.name,
            Source::Template(t) => &t.name,
        }
    }
}

/// A git checkout that fed the generation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha: String,

    /// One line per commit since the previously recorded sha, newest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,

    /// Checkout location during a run. Never written to disk.
    #[serde(skip)]
    pub local_path: Option<PathBuf>,
}

/// A code generator invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratorSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_image: String,
}

/// A template set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemplateSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// A publish target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Destination {
    Client(ClientDestination),
}

/// A client library destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientDestination {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generator: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config: String,
}

/// A file produced by generation, relative to the working-tree root.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct GeneratedFile {
    pub path: String,
}
