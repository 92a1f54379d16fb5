//! core::metadata
//!
//! Generation metadata schema and storage.
//!
//! # Modules
//!
//! - [`schema`] - Metadata schema types
//! - [`store`] - In-process record and file persistence
//!
//! # Architecture
//!
//! Metadata is stored as a JSON file (default `synth.metadata`) at the
//! working-tree root. It records the sources a generation pass consumed
//! and the files it produced, so the next pass can tell which files it
//! owns.
//!
//! # Example
//!
//! ```
//! use gentrack::core::metadata::{parse_metadata, MetadataStore};
//!
//! let mut store = MetadataStore::new();
//! store.add_template_source("python_library", "templates.gcp", "2020.1.1");
//!
//! let json = store.get().to_json().unwrap();
//! let parsed = parse_metadata(&json).unwrap();
//! assert_eq!(&parsed, store.get());
//! ```

pub mod schema;
pub mod store;

// Re-export commonly used types
pub use schema::{
    parse_metadata, ClientDestination, Destination, GeneratedFile, GeneratorSource, GitSource,
    Metadata, MetadataError, Source, TemplateSource,
};
pub use store::{MetadataStore, StoreError, DEFAULT_METADATA_FILE};
