//! Weight subsets and their occurrence probabilities.
//!
//! A weight subset `(w_1, ..., w_k)` stands for "exactly `w_i` faulty
//! locations in partition `i`". For partition sizes `n_i` and error rates
//! `p_i` its probability is `Π_i C(n_i, w_i) p_i^w_i (1 - p_i)^(n_i - w_i)`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NoiseError, NoiseResult};
use crate::math::binom_pmf;

/// Fault count per partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subset(pub Vec<u32>);

impl Subset {
    /// The all-zero subset over `k` partitions.
    pub fn zero(k: usize) -> Self {
        Subset(vec![0; k])
    }

    /// Total number of faults.
    pub fn weight(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Whether no partition carries a fault.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the subset spans no partition.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}

impl From<Vec<u32>> for Subset {
    fn from(weights: Vec<u32>) -> Self {
        Subset(weights)
    }
}

/// Subset probabilities, iterated in lexicographic order (zero subset first).
pub type SubsetProbs = BTreeMap<Subset, f64>;

/// All weight vectors with `w_i <= w_max[i]`, minus `exclude`, in lexicographic order.
pub fn weight_vectors(w_max: &[u32], exclude: &BTreeSet<Subset>) -> Vec<Subset> {
    let mut out = vec![Vec::with_capacity(w_max.len())];
    for &max in w_max {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..=max).map(move |w| {
                    let mut next = prefix.clone();
                    next.push(w);
                    next
                })
            })
            .collect();
    }
    out.into_iter()
        .map(Subset)
        .filter(|s| !exclude.contains(s))
        .collect()
}

/// Probability of one subset for partition sizes `sizes` at rates `p`.
pub fn subset_occurrence(subset: &Subset, sizes: &[usize], p: &[f64]) -> f64 {
    subset
        .0
        .iter()
        .zip(sizes)
        .zip(p)
        .map(|((&w, &n), &p)| binom_pmf(u64::from(w), n as u64, p))
        .product()
}

/// Probability table for `subsets`.
pub fn subset_probs(sizes: &[usize], p: &[f64], subsets: &[Subset]) -> NoiseResult<SubsetProbs> {
    if sizes.len() != p.len() {
        return Err(NoiseError::DimensionMismatch {
            expected: sizes.len(),
            got: p.len(),
        });
    }
    Ok(subsets
        .iter()
        .map(|s| (s.clone(), subset_occurrence(s, sizes, p)))
        .collect())
}

/// Smallest weight `w` whose binomial tail mass above `w` drops below `delta_max`.
pub fn calc_w_max(p_max: f64, delta_max: f64, n: usize) -> u32 {
    let mut delta = 1.0;
    for w in 0..=n {
        delta -= binom_pmf(w as u64, n as u64, p_max);
        if delta < delta_max {
            return w as u32;
        }
    }
    n as u32
}

/// How many subsets to enumerate per circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightCutoff {
    /// Every weight up to the partition size.
    #[default]
    Full,
    /// Fixed maximum weight per partition (a single value applies to all).
    Max { w_max: Vec<u32> },
    /// Per partition, the smallest weight whose tail mass at the sampling
    /// rate is below `delta_max`.
    DeltaMax { delta_max: f64 },
}

impl WeightCutoff {
    /// Maximum weight per partition for the given partition sizes.
    pub fn w_max(&self, sizes: &[usize], p_max: &[f64]) -> NoiseResult<Vec<u32>> {
        let w_max = match self {
            WeightCutoff::Full => sizes.iter().map(|&n| n as u32).collect(),
            WeightCutoff::Max { w_max } => match w_max.as_slice() {
                [w] => sizes.iter().map(|&n| (*w).min(n as u32)).collect(),
                ws if ws.len() == sizes.len() => ws
                    .iter()
                    .zip(sizes)
                    .map(|(&w, &n)| w.min(n as u32))
                    .collect(),
                ws => {
                    return Err(NoiseError::InvalidCutoff(format!(
                        "w_max has {} entries for {} partitions",
                        ws.len(),
                        sizes.len()
                    )));
                }
            },
            WeightCutoff::DeltaMax { delta_max } => {
                if !delta_max.is_finite() || *delta_max <= 0.0 || *delta_max >= 1.0 {
                    return Err(NoiseError::InvalidCutoff(format!(
                        "delta_max must lie in (0, 1), got {delta_max}"
                    )));
                }
                if p_max.len() != sizes.len() {
                    return Err(NoiseError::DimensionMismatch {
                        expected: sizes.len(),
                        got: p_max.len(),
                    });
                }
                sizes
                    .iter()
                    .zip(p_max)
                    .map(|(&n, &p)| calc_w_max(p, *delta_max, n))
                    .collect()
            }
        };
        debug!(?sizes, ?w_max, "resolved weight cutoff");
        Ok(w_max)
    }

    /// Enumerate the subsets to sample for the given partition sizes.
    ///
    /// The zero subset can not be excluded.
    pub fn enumerate(
        &self,
        sizes: &[usize],
        p_max: &[f64],
        exclude: &BTreeSet<Subset>,
    ) -> NoiseResult<Vec<Subset>> {
        if exclude.iter().any(Subset::is_zero) {
            return Err(NoiseError::InvalidCutoff(
                "the zero-weight subset can not be excluded".into(),
            ));
        }
        let w_max = self.w_max(sizes, p_max)?;
        Ok(weight_vectors(&w_max, exclude))
    }
}
