//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use qsamp_noise::{ErrorParams, PauliNoise};
use qsamp_protocol::CatalogProtocol;
use qsamp_sampler::{Callback, Control, SamplerConfig, SamplerView, Tree};

/// Noise models selectable from a run configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoisePreset {
    #[default]
    Depolarizing,
    DepolarizingPerClass,
    BitFlip,
}

impl NoisePreset {
    pub fn model(self) -> PauliNoise {
        match self {
            NoisePreset::Depolarizing => PauliNoise::depolarizing(),
            NoisePreset::DepolarizingPerClass => PauliNoise::depolarizing_per_class(),
            NoisePreset::BitFlip => PauliNoise::bit_flip(),
        }
    }
}

/// Contents of a `qsamp run` configuration file.
///
/// ```yaml
/// protocol:
///   name: syndrome_correction
/// noise: depolarizing
/// p_max: { p: 0.05 }
/// shots: 10000
/// rel_std_target: 0.1
/// sampler:
///   seed: 1
///   err_params: { p: 1.0e-3 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub protocol: CatalogProtocol,
    #[serde(default)]
    pub noise: NoisePreset,
    /// Rates at which subsets are drawn.
    pub p_max: ErrorParams,
    #[serde(default = "default_shots")]
    pub shots: u64,
    /// Stop once the relative standard deviation drops below this value.
    #[serde(default)]
    pub rel_std_target: Option<f64>,
    #[serde(default)]
    pub sampler: SamplerConfig,
}

fn default_shots() -> u64 {
    1000
}

impl RunConfig {
    /// Rates at which the statistic is reported.
    pub fn report_params(&self) -> &ErrorParams {
        self.sampler.err_params.as_ref().unwrap_or(&self.p_max)
    }
}

/// Load a run configuration from a YAML file.
pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_yaml_ng::from_str(&source)
        .with_context(|| format!("Invalid run configuration: {}", path.display()))
}

/// Load a saved statistics tree.
pub fn load_tree(path: &Path) -> Result<Tree> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    Tree::load(path).with_context(|| format!("Failed to load tree: {}", path.display()))
}

/// Short protocol label for terminal output.
pub fn protocol_label(protocol: &CatalogProtocol) -> String {
    match protocol {
        CatalogProtocol::Repetition { rounds } => format!("repetition (rounds = {rounds})"),
        CatalogProtocol::RepeatUntilClean { max_attempts } => {
            format!("repeat_until_clean (max_attempts = {max_attempts})")
        }
        CatalogProtocol::SyndromeCorrection => "syndrome_correction".to_string(),
    }
}

/// Progress bar advanced once per shot.
///
/// The statistic in the message is refreshed every `refresh` shots since
/// computing it walks the whole tree.
pub struct Progress {
    bar: ProgressBar,
    refresh: u64,
}

impl Progress {
    pub fn new(shots: u64, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(shots)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            refresh: (shots / 50).max(1),
        }
    }
}

impl Callback for Progress {
    fn on_protocol_end(&mut self, sampler: &dyn SamplerView) -> Control {
        self.bar.inc(1);
        if sampler.shots_completed() % self.refresh == 0 {
            let stats = sampler.current_stats();
            self.bar.set_message(format!("p_L ≈ {:.3e}", stats.p_l_low));
        }
        Control::Continue
    }

    fn on_sampler_end(&mut self, _sampler: &dyn SamplerView) {
        self.bar.finish_and_clear();
    }
}
