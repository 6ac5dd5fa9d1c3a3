//! Error types for the samplers.

use qsamp_ir::IrError;
use qsamp_noise::NoiseError;
use qsamp_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised while configuring, running or persisting a sampler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SamplerError {
    /// Invalid sampler configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Protocol construction or transition failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Fault model failure.
    #[error(transparent)]
    Noise(#[from] NoiseError),

    /// The executor could not run a circuit.
    #[error("Execution failed at node {node}: {source}")]
    Execution {
        /// Protocol node whose circuit failed.
        node: String,
        /// Executor error.
        #[source]
        source: IrError,
    },

    /// A fatal error ended a run; the tree keeps everything sampled so far.
    #[error("Sampling aborted after {shots_completed} completed shots: {source}")]
    Aborted {
        /// Shots fully completed before the failing one.
        shots_completed: u64,
        /// The error that ended the run.
        #[source]
        source: Box<SamplerError>,
    },

    /// Persisted tree is malformed.
    #[error("Invalid tree document: {0}")]
    InvalidDocument(String),

    /// Trees can not be merged.
    #[error("Tree mismatch: {0}")]
    TreeMismatch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SamplerError {
    /// Whether the error stems from invalid configuration: cutoff parameters,
    /// error rates, or a protocol with no or ambiguous transitions.
    pub fn is_configuration(&self) -> bool {
        match self {
            SamplerError::Configuration(_) => true,
            SamplerError::Protocol(e) => e.is_configuration(),
            SamplerError::Noise(e) => e.is_configuration(),
            SamplerError::Aborted { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// Whether an executor met an operation it can not apply.
    pub fn is_unknown_operation(&self) -> bool {
        match self {
            SamplerError::Execution { source, .. } => {
                matches!(source, IrError::UnknownOperation { .. })
            }
            SamplerError::Aborted { source, .. } => source.is_unknown_operation(),
            _ => false,
        }
    }
}

/// Result type for sampler operations.
pub type SamplerResult<T> = Result<T, SamplerError>;
