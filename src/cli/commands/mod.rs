//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler:
//! 1. Resolves the working-tree root and loads configuration
//! 2. Calls into the library
//! 3. Formats and displays output

mod show;
mod track;

pub use show::show;
pub use track::{track, TrackArgs};

use super::args::Command;
use super::Context;
use crate::core::config::{Config, ConfigLoadResult};
use crate::core::types::RepoPath;
use crate::git::Git;
use anyhow::{bail, Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Track {
            metadata_file,
            no_track_obsolete,
            no_write,
            git_sources,
            upstreams,
            generators,
            templates,
            command,
        } => track(
            ctx,
            TrackArgs {
                metadata_file,
                no_track_obsolete,
                no_write,
                git_sources,
                upstreams,
                generators,
                templates,
                command,
            },
        ),
        Command::Show {
            metadata_file,
            files,
            json,
        } => show(ctx, metadata_file.as_deref(), files, json),
    }
}

/// The working-tree root for the context's directory.
///
/// Outside a git repository the directory itself is the root.
fn resolve_root(ctx: &Context) -> Result<PathBuf> {
    let cwd = ctx.working_dir()?;
    match Git::open(&cwd).and_then(|git| git.info()) {
        Ok(info) => Ok(info.work_dir),
        Err(e) => {
            debug!("{}; using {} as root", e, cwd.display());
            Ok(cwd)
        }
    }
}

fn load_config(root: &Path) -> Result<Config> {
    let ConfigLoadResult { config, warnings } =
        Config::load(Some(root)).context("Failed to load configuration")?;
    for warning in warnings {
        warn!("{}: {}", warning.message, warning.path.display());
    }
    Ok(config)
}

/// Metadata path from a `--metadata-file` flag, falling back to config.
fn metadata_path(root: &Path, config: &Config, flag: Option<&str>) -> Result<PathBuf> {
    let Some(file) = flag else {
        return Ok(config.metadata_path(root));
    };
    let path = RepoPath::new(file).with_context(|| format!("Invalid metadata file '{}'", file))?;
    if path.is_in_git_dir() {
        bail!("Metadata file '{}' must not be inside .git", file);
    }
    Ok(path.to_fs_path(root))
}
