//! core
//!
//! Core domain types, schemas, and configuration for gentrack.
//!
//! # Modules
//!
//! - [`types`] - Strong types: RepoPath, Oid, UtcTimestamp
//! - [`metadata`] - Generation metadata schema and storage
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Paths that reach the filesystem are always working-tree relative

pub mod config;
pub mod metadata;
pub mod types;
