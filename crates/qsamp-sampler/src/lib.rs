//! Logical failure rate samplers for fault-tolerant protocols.
//!
//! [`SubsetSampler`] estimates the probability that a protocol ends in
//! `FAIL` by sampling fault configurations grouped into weight subsets.
//! Transitions between protocol nodes are estimated from counts, while the
//! probability of each subset is computed exactly, so the estimate stays
//! accurate at error rates where failures are too rare to observe directly.
//! Counts are kept in a [`Tree`]; [`Estimator`] turns a tree into the
//! statistic at any error rates without further sampling.
//!
//! [`DirectSampler`] is the plain Monte Carlo counterpart.
//!
//! # Example
//!
//! ```rust
//! use qsamp_ir::GateClass;
//! use qsamp_noise::{Channel, ErrorParams, PauliNoise};
//! use qsamp_protocol::catalog::repetition;
//! use qsamp_sampler::{SamplerConfig, SubsetSampler};
//! use qsamp_sim::bit_flip_factory;
//!
//! let protocol = repetition(1).unwrap();
//! let model = PauliNoise::new("bit_flip", Channel::BitFlip)
//!     .with_group("p", [GateClass::SingleQubit]);
//! let p_max = ErrorParams::new().with("p", 0.1);
//! let config = SamplerConfig::default().with_seed(7);
//!
//! let mut sampler =
//!     SubsetSampler::new(protocol, bit_flip_factory(), model, &p_max, config).unwrap();
//! sampler.run(200, &mut []).unwrap();
//!
//! let low = ErrorParams::new().with("p", 1e-3);
//! let stats = sampler.stats(Some(&low)).unwrap();
//! assert!(stats.p_l_low <= stats.p_l_up);
//! ```

pub mod callbacks;
pub mod config;
pub mod direct;
mod driver;
pub mod error;
pub mod estimate;
pub mod subset;
pub mod tree;

pub use callbacks::{
    Callback, CircuitEvent, Control, RelStdTarget, SamplerView, StatsPerSample, VerboseCircuitExec,
};
pub use config::SamplerConfig;
pub use direct::DirectSampler;
pub use driver::RunSummary;
pub use error::{SamplerError, SamplerResult};
pub use estimate::{Constants, Estimator, Stats, VarianceMode};
pub use subset::SubsetSampler;
pub use tree::{CUTOFF, NodeDocument, NodeId, NodeKind, Tree, TreeDocument, TreeNode};
