//! Init command implementation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use playpen_core::DEFAULT_SOURCE;

const DEFAULT_CONFIG: &str = include_str!("../../../playpen.yml.example");

/// Write a starter config and component into `path`.
pub fn init_project(path: Option<&Path>) -> Result<()> {
    let root = path.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    write_if_absent(&root.join("playpen.yml"), DEFAULT_CONFIG)?;
    write_if_absent(&root.join("App.tsx"), DEFAULT_SOURCE)?;

    println!("✓ playpen initialized in {:?}", root);
    println!("  - Edit playpen.yml to change the module host or sandbox grant");
    println!("  - Run `playpen serve --file App.tsx` to preview App.tsx live");
    Ok(())
}

fn write_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        println!("{:?} already exists", path);
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Created {:?}", path);
    Ok(())
}
