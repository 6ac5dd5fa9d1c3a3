//! Error model capability.

use rand::seq::index;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use qsamp_ir::{Circuit, Gate, Location};

use crate::error::{NoiseError, NoiseResult};
use crate::subset::{Subset, SubsetProbs, subset_probs, weight_vectors};

/// One faultable operation of a circuit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaultLocation {
    /// Tick index of the operation.
    pub tick: usize,
    /// The faulted operation.
    pub gate: Gate,
    /// Where it acts.
    pub location: Location,
}

/// Locations sharing one error channel and one error rate.
pub type Partition = Vec<FaultLocation>;

/// Partition sizes, the `n_i` of the subset probability formula.
pub fn partition_sizes(partitions: &[Partition]) -> Vec<usize> {
    partitions.iter().map(Vec::len).collect()
}

/// A parameterized random-fault model.
///
/// Implementations partition a circuit's locations into one group per
/// parameter (see [`ErrorModel::groups`]) and turn chosen locations into a
/// fault circuit. Randomness is always drawn from the caller's generator.
pub trait ErrorModel: Send + Sync {
    /// Model name, used in logs.
    fn name(&self) -> &str;

    /// Parameter group names, in partition order.
    fn groups(&self) -> &[String];

    /// Partition the faultable locations of `circuit`, one partition per group.
    fn group(&self, circuit: &Circuit) -> Vec<Partition>;

    /// Materialize a fault circuit with the same tick count as `circuit`.
    fn run(
        &self,
        circuit: &Circuit,
        faults: &[FaultLocation],
        rng: &mut dyn RngCore,
    ) -> NoiseResult<Circuit>;

    /// Probability of every weight subset of `circuit` at rates `p`.
    fn subset_probs(&self, circuit: &Circuit, p: &[f64]) -> NoiseResult<SubsetProbs> {
        let sizes = partition_sizes(&self.group(circuit));
        let w_max: Vec<u32> = sizes.iter().map(|&n| n as u32).collect();
        let subsets = weight_vectors(&w_max, &Default::default());
        subset_probs(&sizes, p, &subsets)
    }

    /// Pick `subset[i]` distinct locations uniformly from partition `i`.
    fn choose_w(
        &self,
        partitions: &[Partition],
        subset: &Subset,
        rng: &mut dyn RngCore,
    ) -> NoiseResult<Vec<FaultLocation>> {
        if subset.len() != partitions.len() {
            return Err(NoiseError::DimensionMismatch {
                expected: partitions.len(),
                got: subset.len(),
            });
        }
        let mut chosen = Vec::with_capacity(subset.weight() as usize);
        for (i, (partition, &w)) in partitions.iter().zip(&subset.0).enumerate() {
            if w as usize > partition.len() {
                return Err(NoiseError::WeightExceedsPartition {
                    partition: i,
                    weight: w,
                    size: partition.len(),
                });
            }
            chosen.extend(
                index::sample(rng, partition.len(), w as usize)
                    .into_iter()
                    .map(|j| partition[j].clone()),
            );
        }
        Ok(chosen)
    }

    /// Select each location of partition `i` independently with probability `p[i]`.
    fn choose_p(
        &self,
        partitions: &[Partition],
        p: &[f64],
        rng: &mut dyn RngCore,
    ) -> NoiseResult<Vec<FaultLocation>> {
        if p.len() != partitions.len() {
            return Err(NoiseError::DimensionMismatch {
                expected: partitions.len(),
                got: p.len(),
            });
        }
        let mut chosen = Vec::new();
        for (partition, &p) in partitions.iter().zip(p) {
            for loc in partition {
                if rng.r#gen::<f64>() < p {
                    chosen.push(loc.clone());
                }
            }
        }
        Ok(chosen)
    }
}
