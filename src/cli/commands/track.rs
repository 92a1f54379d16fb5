//! track command - Run a generator inside a tracked scope
//!
//! Sources given on the command line are recorded before the scope opens,
//! so a bad `--git-source` or a failed clone stops the command before
//! anything is deleted. Once the scope is open, it is always closed, and
//! the generator's own failure is reported afterwards.

use super::{load_config, metadata_path, resolve_root};
use crate::cli::args::{GeneratorArg, GitSourceArg, TemplateArg, UpstreamArg};
use crate::cli::Context;
use crate::core::metadata::MetadataStore;
use crate::sources::{add_git_source_from_directory, SourceCache, Upstream};
use crate::tracker::{ScopeOptions, ScopeReport, TrackedScope};
use anyhow::{bail, Context as _, Result};
use std::process::{Command, ExitStatus};

/// Arguments for [`track`].
#[derive(Debug, Clone, Default)]
pub struct TrackArgs {
    pub metadata_file: Option<String>,
    pub no_track_obsolete: bool,
    pub no_write: bool,
    pub git_sources: Vec<GitSourceArg>,
    pub upstreams: Vec<UpstreamArg>,
    pub generators: Vec<GeneratorArg>,
    pub templates: Vec<TemplateArg>,
    pub command: Vec<String>,
}

/// Run a generator command and record what it produced.
pub fn track(ctx: &Context, args: TrackArgs) -> Result<()> {
    let cwd = ctx.working_dir()?;
    let root = resolve_root(ctx)?;
    let config = load_config(&root)?;

    let mut store = MetadataStore::new();
    store.set_track_obsolete_files(config.track_obsolete_files() && !args.no_track_obsolete);
    store.enable_write_metadata(config.write_metadata() && !args.no_write);

    for source in &args.git_sources {
        let dir = cwd.join(&source.dir);
        add_git_source_from_directory(&mut store, &source.name, &dir)
            .with_context(|| format!("Failed to record git source '{}'", source.name))?;
    }

    let mut cache = SourceCache::from_config(&config);
    for upstream in &args.upstreams {
        cache
            .fetch_configured(&mut store, &Upstream::new(&upstream.name, &upstream.url), &config)
            .with_context(|| format!("Failed to fetch upstream '{}'", upstream.name))?;
    }

    for generator in &args.generators {
        store.add_generator_source(&generator.name, &generator.version, &generator.docker_image);
    }
    for template in &args.templates {
        store.add_template_source(&template.name, &template.origin, &template.version);
    }

    let options = ScopeOptions::from_config(&root, &config).with_metadata_path(metadata_path(
        &root,
        &config,
        args.metadata_file.as_deref(),
    )?);
    let metadata_display = options.metadata_path.display().to_string();

    let scope = TrackedScope::open(&mut store, options).context("Failed to start tracking")?;
    let status = run_generator(&args.command, &cwd);
    let report = scope
        .close()
        .with_context(|| format!("Failed to update {}", metadata_display))?;

    if !ctx.quiet {
        print_report(&report, &metadata_display);
    }

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => bail!("Generator command exited with {}", status),
        Err(e) => Err(e),
    }
}

fn run_generator(command: &[String], dir: &std::path::Path) -> Result<ExitStatus> {
    let Some((program, args)) = command.split_first() else {
        bail!("No generator command given");
    };
    Command::new(program)
        .args(args)
        .current_dir(dir)
        .status()
        .with_context(|| format!("Failed to run '{}'", program))
}

fn print_report(report: &ScopeReport, metadata_path: &str) {
    if let Some(reconcile) = &report.reconcile {
        println!("Recorded {} generated file(s)", report.new_files);
        if !reconcile.removed.is_empty() {
            println!("Removed {} obsolete file(s)", reconcile.removed.len());
        }
        for failure in &reconcile.failures {
            println!("Could not remove {}: {}", failure.path, failure.error);
        }
    }
    if report.logs_appended > 0 {
        println!("Appended commit logs for {} source(s)", report.logs_appended);
    }
    if report.wrote_metadata {
        println!("Wrote {}", metadata_path);
    }
}
