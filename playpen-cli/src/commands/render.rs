//! Render command: synthesize one preview document without a server.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use playpen_core::Config;
use playpen_render::Synthesizer;

use super::read_source;

/// Synthesize `input` (the starter component when absent) and write the
/// document to `output`, or stdout.
pub fn render_document(config_path: &Path, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let source = read_source(input)?;

    let doc = Synthesizer::new(config.preview)
        .render(&source)
        .context("Failed to synthesize document")?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            fs::write(path, &doc.html).with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!(path = %path.display(), imports = doc.imports.len(), "wrote preview document");
        }
        None => print!("{}", doc.html),
    }
    Ok(())
}
