//! tracker
//!
//! Generated-file lifecycle tracking.
//!
//! # Components
//!
//! - [`observer`] - Reports files touched since a scope opened
//! - [`ignore`] - Drops version-control-ignored paths via `git check-ignore`
//! - [`reconcile`] - Deletes files the previous run generated but this one did not
//! - [`scope`] - Ties the above to a [`MetadataStore`](crate::core::metadata::MetadataStore)
//!   for the length of one generation pass
//!
//! Most callers only need [`run_tracked`] or [`TrackedScope`].

pub mod ignore;
pub mod observer;
pub mod reconcile;
pub mod scope;

pub use ignore::{IgnoreCheck, IgnoreError, IgnoreFilter};
pub use observer::ChangeObserver;
pub use reconcile::{obsolete_files, remove_obsolete_files, DeletionFailure, ReconcileReport};
pub use scope::{run_tracked, ScopeError, ScopeOptions, ScopeReport, TrackedScope};
