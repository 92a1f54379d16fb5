//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gentrack - Track the files a code generator produces
#[derive(Parser, Debug)]
#[command(name = "gentrack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gentrack was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Minimal output; only warnings and errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a generator and record the files it produces
    #[command(
        name = "track",
        long_about = "Run a generator and record the files it produces.\n\n\
            Every file the command creates or modifies under the working tree is \
            recorded in the metadata file, unless git ignores it. Files recorded \
            by the previous run that this run did not produce are deleted.\n\n\
            The metadata file is updated even when the command fails.",
        after_help = "\
EXAMPLES:
    # Regenerate a client library and record the result
    gentrack track --generator gapic=1.4.0 -- ./generate.sh

    # Record the API definitions checkout the generator read from
    gentrack track --git-source googleapis=../googleapis -- make gen

    # Record which files were produced without deleting anything
    gentrack track --no-track-obsolete -- ./generate.sh"
    )]
    Track {
        /// Metadata file, relative to the working-tree root
        #[arg(long, value_name = "PATH")]
        metadata_file: Option<String>,

        /// Do not record generated files or delete obsolete ones
        #[arg(long)]
        no_track_obsolete: bool,

        /// Do not write the metadata file
        #[arg(long)]
        no_write: bool,

        /// Record a local git checkout as a source
        #[arg(long = "git-source", value_name = "NAME=DIR", value_parser = parse_git_source)]
        git_sources: Vec<GitSourceArg>,

        /// Fetch an upstream (or its configured local checkout) and record it
        #[arg(long = "upstream", value_name = "NAME=URL", value_parser = parse_upstream)]
        upstreams: Vec<UpstreamArg>,

        /// Record a generator source
        #[arg(long = "generator", value_name = "NAME=VERSION[@IMAGE]", value_parser = parse_generator)]
        generators: Vec<GeneratorArg>,

        /// Record a template source
        #[arg(long = "template", value_name = "NAME=ORIGIN[@VERSION]", value_parser = parse_template)]
        templates: Vec<TemplateArg>,

        /// Generator command and its arguments
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Show the recorded metadata
    #[command(name = "show")]
    Show {
        /// Metadata file, relative to the working-tree root
        #[arg(long, value_name = "PATH")]
        metadata_file: Option<String>,

        /// List generated files
        #[arg(long)]
        files: bool,

        /// Print the raw metadata document
        #[arg(long, conflicts_with = "files")]
        json: bool,
    },
}

/// `--git-source NAME=DIR`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSourceArg {
    pub name: String,
    pub dir: PathBuf,
}

/// `--upstream NAME=URL`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamArg {
    pub name: String,
    pub url: String,
}

/// `--generator NAME=VERSION[@IMAGE]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorArg {
    pub name: String,
    pub version: String,
    pub docker_image: String,
}

/// `--template NAME=ORIGIN[@VERSION]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateArg {
    pub name: String,
    pub origin: String,
    pub version: String,
}

fn split_named(value: &str) -> Result<(&str, &str), String> {
    match value.split_once('=') {
        Some((name, rest)) if !name.is_empty() && !rest.is_empty() => Ok((name, rest)),
        _ => Err(format!("expected NAME=VALUE, got '{}'", value)),
    }
}

fn split_optional_at(value: &str) -> (&str, &str) {
    value.split_once('@').unwrap_or((value, ""))
}

fn parse_git_source(value: &str) -> Result<GitSourceArg, String> {
    let (name, dir) = split_named(value)?;
    Ok(GitSourceArg {
        name: name.to_string(),
        dir: PathBuf::from(dir),
    })
}

fn parse_upstream(value: &str) -> Result<UpstreamArg, String> {
    let (name, url) = split_named(value)?;
    Ok(UpstreamArg {
        name: name.to_string(),
        url: url.to_string(),
    })
}

fn parse_generator(value: &str) -> Result<GeneratorArg, String> {
    let (name, rest) = split_named(value)?;
    let (version, docker_image) = split_optional_at(rest);
    Ok(GeneratorArg {
        name: name.to_string(),
        version: version.to_string(),
        docker_image: docker_image.to_string(),
    })
}

fn parse_template(value: &str) -> Result<TemplateArg, String> {
    let (name, rest) = split_named(value)?;
    // Origins are often URLs with their own '@', so split on the last one.
    let (origin, version) = rest.rsplit_once('@').unwrap_or((rest, ""));
    Ok(TemplateArg {
        name: name.to_string(),
        origin: origin.to_string(),
        version: version.to_string(),
    })
}
