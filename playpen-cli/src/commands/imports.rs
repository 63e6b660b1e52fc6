//! Imports command: show what a source file pulls in and how it resolves.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use playpen_core::{Config, ResolutionMap};
use playpen_render::Synthesizer;

use super::read_source;

#[derive(Serialize)]
struct ImportsReport<'a> {
    imports: &'a [String],
    resolution: &'a ResolutionMap,
}

pub fn show_imports(config_path: &Path, input: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let source = read_source(input)?;
    let (imports, resolution) = Synthesizer::new(config.preview).resolve(&source);

    if json {
        let report = ImportsReport {
            imports: &imports,
            resolution: &resolution,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if imports.is_empty() {
        println!("No external imports.");
    } else {
        println!("Imports:");
        for spec in &imports {
            println!("  {}", spec);
        }
    }

    println!("\nResolution map:");
    for (spec, url) in resolution.iter() {
        println!("  {} -> {}", spec, url);
    }
    Ok(())
}
