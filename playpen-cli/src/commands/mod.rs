//! CLI command implementations.

pub mod imports;
pub mod init;
pub mod render;
pub mod serve;

pub use imports::show_imports;
pub use init::init_project;
pub use render::render_document;
pub use serve::{serve, ServeOptions};

use anyhow::{Context, Result};
use std::path::Path;

use playpen_core::DEFAULT_SOURCE;

/// Source text from `path`, or the starter component.
fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path)),
        None => Ok(DEFAULT_SOURCE.to_string()),
    }
}
