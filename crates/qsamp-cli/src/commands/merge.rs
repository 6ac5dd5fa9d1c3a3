//! Merge command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use super::common::load_tree;

pub fn execute(a: &Path, b: &Path, output: &Path) -> Result<()> {
    let mut tree = load_tree(a)?;
    let other = load_tree(b)?;
    tree.merge(&other)
        .with_context(|| format!("Cannot merge {} into {}", b.display(), a.display()))?;
    tree.save(output)
        .with_context(|| format!("Failed to save tree: {}", output.display()))?;

    println!(
        "{} Merged {} shots into {}",
        style("✓").green().bold(),
        tree.node(tree.root()).count(),
        style(output.display()).cyan()
    );
    Ok(())
}
