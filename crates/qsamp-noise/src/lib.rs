//! Fault models for qsamp.
//!
//! An error model splits the faultable locations of a circuit into
//! partitions, one per parameter group. Subset sampling does not draw each
//! location independently; it draws a weight subset (how many faults per
//! partition) with probability
//!
//! ```text
//! P(w_1..w_k) = Π_i C(n_i, w_i) · p_i^w_i · (1 − p_i)^(n_i − w_i)
//! ```
//!
//! and then places exactly that many faults uniformly inside each
//! partition ([`ErrorModel::choose_w`]). [`WeightCutoff`] limits the
//! enumerated subsets; the mass left out becomes the sampler's cutoff error.
//!
//! [`PauliNoise`] is the bundled model: Pauli faults on configurable
//! operation classes.

pub mod error;
pub mod math;
pub mod model;
pub mod params;
pub mod pauli;
pub mod subset;

pub use error::{NoiseError, NoiseResult};
pub use model::{ErrorModel, FaultLocation, Partition, partition_sizes};
pub use params::ErrorParams;
pub use pauli::{Channel, PauliNoise};
pub use subset::{
    Subset, SubsetProbs, WeightCutoff, calc_w_max, subset_occurrence, subset_probs,
    weight_vectors,
};
