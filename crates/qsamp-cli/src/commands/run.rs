//! Run command implementation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use tracing::info;

use qsamp_sampler::{
    Callback, DirectSampler, RelStdTarget, RunSummary, Stats, SubsetSampler, Tree,
};
use qsamp_sim::bit_flip_factory;

use super::common::{Progress, RunConfig, load_run_config, load_tree, protocol_label};

/// Arguments of `qsamp run`.
pub struct RunArgs {
    pub config: PathBuf,
    pub shots: Option<u64>,
    pub save: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub direct: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    protocol: &'a str,
    sampler: &'a str,
    shots: u64,
    total_shots: u64,
    stopped_early: bool,
    stats: Stats,
    delta: f64,
}

pub fn execute(args: &RunArgs) -> Result<()> {
    let config = load_run_config(&args.config)?;
    let shots = args.shots.unwrap_or(config.shots);
    let label = protocol_label(&config.protocol);

    if !args.json {
        println!(
            "{} Sampling {} with {:?} noise, {} shots",
            style("→").cyan().bold(),
            style(&label).bold(),
            config.noise,
            shots
        );
    }

    let start = Instant::now();
    let (summary, total, stats, tree) = if args.direct {
        run_direct(&config, shots, args)?
    } else {
        run_subset(&config, shots, args)?
    };
    let elapsed = start.elapsed();
    info!(shots = summary.shots, ?elapsed, "run finished");

    if let Some(path) = &args.save {
        tree.save(path)
            .with_context(|| format!("Failed to save tree: {}", path.display()))?;
    }

    if args.json {
        let report = RunReport {
            protocol: &label,
            sampler: if args.direct { "direct" } else { "subset" },
            shots: summary.shots,
            total_shots: total,
            stopped_early: summary.stopped_early,
            stats,
            delta: stats.delta(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} shots in {:.2?}{}",
        style("✓").green().bold(),
        summary.shots,
        elapsed,
        if summary.stopped_early {
            " (target reached)"
        } else {
            ""
        }
    );
    if total != summary.shots {
        println!("  Total shots in tree: {total}");
    }
    println!("  Reported at: {}", config.report_params());
    println!("  {stats}");
    println!("  Cutoff error δ: {:.4e}", stats.delta());
    if let Some(path) = &args.save {
        println!("  Tree saved to {}", style(path.display()).cyan());
    }

    Ok(())
}

fn callbacks(config: &RunConfig, shots: u64, hidden: bool) -> (Progress, Option<RelStdTarget>) {
    (
        Progress::new(shots, hidden),
        config.rel_std_target.map(RelStdTarget::new),
    )
}

fn run_subset(
    config: &RunConfig,
    shots: u64,
    args: &RunArgs,
) -> Result<(RunSummary, u64, Stats, Tree)> {
    let protocol = config.protocol.build().context("Failed to build protocol")?;
    let mut sampler = SubsetSampler::new(
        protocol,
        bit_flip_factory(),
        config.noise.model(),
        &config.p_max,
        config.sampler.clone(),
    )
    .context("Failed to set up the subset sampler")?;

    if let Some(path) = &args.resume {
        let previous = load_tree(path)?;
        sampler
            .merge_tree(&previous)
            .with_context(|| format!("Cannot resume from {}", path.display()))?;
    }

    let (mut progress, mut target) = callbacks(config, shots, args.json);
    let mut cbs: Vec<&mut dyn Callback> = vec![&mut progress];
    if let Some(t) = target.as_mut() {
        cbs.push(t);
    }
    let summary = sampler.run(shots, &mut cbs)?;
    let stats = sampler.stats(None)?;
    let total = sampler.tree().node(sampler.tree().root()).count();
    Ok((summary, total, stats, sampler.tree().clone()))
}

fn run_direct(
    config: &RunConfig,
    shots: u64,
    args: &RunArgs,
) -> Result<(RunSummary, u64, Stats, Tree)> {
    if let Some(path) = &args.resume {
        anyhow::bail!(
            "--resume is only supported by the subset sampler (got {})",
            path.display()
        );
    }
    let protocol = config.protocol.build().context("Failed to build protocol")?;
    let mut sampler = DirectSampler::new(
        protocol,
        bit_flip_factory(),
        config.noise.model(),
        config.report_params(),
        &config.sampler,
    )
    .context("Failed to set up the direct sampler")?;

    let (mut progress, mut target) = callbacks(config, shots, args.json);
    let mut cbs: Vec<&mut dyn Callback> = vec![&mut progress];
    if let Some(t) = target.as_mut() {
        cbs.push(t);
    }
    let summary = sampler.run(shots, &mut cbs)?;
    Ok((
        summary,
        sampler.shots_completed(),
        sampler.stats(),
        sampler.tree().clone(),
    ))
}
