//! gentrack - Generated-file lifecycle tracking for code generation pipelines
//!
//! A generation pass runs inside a tracked scope. While the scope is open,
//! callers record the inputs the pass used (upstream git checkouts,
//! generator versions, templates). When the scope closes, gentrack records
//! every file the pass wrote, deletes files the previous pass wrote but
//! this one did not, appends upstream commit logs, and persists all of it
//! to a metadata file in the working tree.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the tracker)
//! - [`tracker`] - Change observer, ignore filter, reconciler and the scope guard
//! - [`sources`] - Upstream checkouts recorded as git sources
//! - [`core`] - Domain types, metadata schema and store, configuration
//! - [`git`] - Single interface for repository queries
//!
//! # Correctness Invariants
//!
//! 1. Files inside `.git` are never recorded and never deleted
//! 2. Files ignored by git are never recorded and never deleted
//! 3. Nothing is deleted unless it was recorded by the previous pass
//! 4. The metadata file is replaced atomically

pub mod cli;
pub mod core;
pub mod git;
pub mod sources;
pub mod tracker;
