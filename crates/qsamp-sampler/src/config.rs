//! Sampler configuration.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use qsamp_noise::{ErrorParams, Subset, WeightCutoff};

use crate::error::SamplerResult;

/// Knobs shared by the samplers.
///
/// ```yaml
/// seed: 42
/// max_path_len: 3
/// cutoff:
///   kind: max
///   w_max: [2]
/// exclude: [[2]]
/// err_params:
///   p: 1.0e-3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Seed of the sampler's random generator; entropy when unset.
    pub seed: Option<u64>,
    /// Longest meaningful protocol path, the `L` of the cutoff fallback.
    /// Defaults to the number of noisy protocol nodes.
    pub max_path_len: Option<usize>,
    /// Subset enumeration cutoff.
    pub cutoff: WeightCutoff,
    /// Subsets never sampled.
    pub exclude: BTreeSet<Subset>,
    /// Error rates at which statistics are reported; the sampling rates when unset.
    pub err_params: Option<ErrorParams>,
}

impl SamplerConfig {
    /// Parse from YAML text.
    pub fn from_yaml_str(yaml: &str) -> SamplerResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SamplerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the subset cutoff.
    #[must_use]
    pub fn with_cutoff(mut self, cutoff: WeightCutoff) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Set the reporting error rates.
    #[must_use]
    pub fn with_err_params(mut self, params: ErrorParams) -> Self {
        self.err_params = Some(params);
        self
    }

    /// Set `L`.
    #[must_use]
    pub fn with_max_path_len(mut self, len: usize) -> Self {
        self.max_path_len = Some(len);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_full() {
        let yaml = "seed: 42\nmax_path_len: 3\ncutoff:\n  kind: max\n  w_max: [2]\nexclude: [[2]]\nerr_params:\n  p: 1.0e-3\n";
        let cfg = SamplerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.max_path_len, Some(3));
        assert_eq!(cfg.cutoff, WeightCutoff::Max { w_max: vec![2] });
        assert!(cfg.exclude.contains(&Subset(vec![2])));
        assert_eq!(cfg.err_params.and_then(|p| p.get("p")), Some(1.0e-3));
    }

    #[test]
    fn test_yaml_defaults_and_unknown_field() {
        let cfg = SamplerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg, SamplerConfig::default());
        assert!(SamplerConfig::from_yaml_str("sede: 1").is_err());
    }
}
