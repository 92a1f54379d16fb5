//! show command - Print the recorded metadata

use super::{load_config, metadata_path, resolve_root};
use crate::cli::Context;
use crate::core::metadata::{Destination, MetadataStore, Source};
use anyhow::{Context as _, Result};

/// Print the metadata recorded for the current working tree.
pub fn show(ctx: &Context, metadata_file: Option<&str>, files: bool, json: bool) -> Result<()> {
    let root = resolve_root(ctx)?;
    let config = load_config(&root)?;
    let path = metadata_path(&root, &config, metadata_file)?;

    let metadata = MetadataStore::read_or_empty(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if json {
        println!("{}", metadata.to_json()?);
        return Ok(());
    }

    if files {
        for file in &metadata.new_files {
            println!("{}", file.path);
        }
        return Ok(());
    }

    if let Some(time) = &metadata.update_time {
        println!("Updated: {}", time);
    }

    if metadata.sources.is_empty() {
        println!("Sources: none");
    } else {
        println!("Sources:");
        for source in &metadata.sources {
            match source {
                Source::Git(git) => {
                    let sha = git.sha.get(..7).unwrap_or(&git.sha);
                    println!("  git       {} {} {}", git.name, sha, git.remote);
                    if let Some(log) = &git.log {
                        println!("            {} new commit(s)", log.lines().count());
                    }
                }
                Source::Generator(generator) => {
                    println!("  generator {} {}", generator.name, generator.version)
                }
                Source::Template(template) => println!(
                    "  template  {} {} {}",
                    template.name, template.origin, template.version
                ),
            }
        }
    }

    for destination in &metadata.destinations {
        let Destination::Client(client) = destination;
        println!(
            "Destination: {} {} ({})",
            client.api_name, client.api_version, client.language
        );
    }

    println!("Generated files: {}", metadata.new_files.len());
    Ok(())
}
