//! Inspect command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use qsamp_noise::math::{Z_95, wilson_ci};
use qsamp_sampler::{NodeKind, Tree};

use super::common::load_tree;

/// Node counts per kind.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub chance: usize,
    pub invariant: usize,
    pub subset: usize,
    pub cutoff: usize,
}

pub fn kind_counts(tree: &Tree) -> KindCounts {
    let mut counts = KindCounts::default();
    for id in tree.ids() {
        match tree.node(id).kind() {
            NodeKind::Chance { invariant, .. } => {
                counts.chance += 1;
                if *invariant {
                    counts.invariant += 1;
                }
            }
            NodeKind::Subset { .. } => counts.subset += 1,
            NodeKind::Cutoff => counts.cutoff += 1,
        }
    }
    counts
}

pub fn execute(path: &Path, full: bool) -> Result<()> {
    let tree = load_tree(path)?;
    let shots = tree.node(tree.root()).count();
    let counts = kind_counts(&tree);

    println!(
        "{} {} ({} nodes, {} shots)",
        style("→").cyan().bold(),
        style(path.display()).bold(),
        tree.len(),
        shots
    );
    println!(
        "  Chance nodes: {} ({} invariant)",
        counts.chance, counts.invariant
    );
    println!("  Subset nodes: {}", counts.subset);
    println!("  Cutoff nodes: {}", counts.cutoff);

    let marked = tree.marked();
    println!();
    println!("{} ({})", style("Marked leaves").bold(), marked.len());
    let mut failures = 0;
    for &id in marked {
        let node = tree.node(id);
        failures += node.count();
        println!(
            "  {:>8}  {}",
            node.count(),
            tree.label_path(id).join(" / ")
        );
    }

    let (lo, hi) = wilson_ci(failures, shots, Z_95);
    println!();
    println!(
        "{} {:.4e} (95% CI {:.4e} .. {:.4e})",
        style("Direct estimate:").bold(),
        tree.direct_rate(),
        lo,
        hi
    );

    if full {
        println!();
        print!("{tree}");
    }

    Ok(())
}
