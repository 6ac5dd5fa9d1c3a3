//! Error types for fault models.

use qsamp_ir::IrError;
use thiserror::Error;

/// Result type for fault-model operations.
pub type NoiseResult<T> = Result<T, NoiseError>;

/// Errors raised while configuring or applying a fault model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NoiseError {
    /// No physical error rate given for a parameter group.
    #[error("No error rate given for group '{0}'")]
    MissingGroup(String),

    /// Error rate outside [0, 1].
    #[error("Error rate {value} for group '{group}' is not a probability")]
    InvalidProbability { group: String, value: f64 },

    /// Weight cutoff parameters cannot be applied.
    #[error("Invalid weight cutoff: {0}")]
    InvalidCutoff(String),

    /// Per-partition vector of the wrong length.
    #[error("Expected {expected} per-partition values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Subset asks for more faults than a partition has locations.
    #[error("Weight {weight} exceeds partition {partition} of size {size}")]
    WeightExceedsPartition {
        partition: usize,
        weight: u32,
        size: usize,
    },

    /// Fault circuit could not be assembled.
    #[error(transparent)]
    Ir(#[from] IrError),
}

impl NoiseError {
    /// Whether the error stems from invalid user configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            NoiseError::MissingGroup(_)
                | NoiseError::InvalidProbability { .. }
                | NoiseError::InvalidCutoff(_)
                | NoiseError::DimensionMismatch { .. }
        )
    }
}
