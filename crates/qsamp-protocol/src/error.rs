//! Error handling for protocols.

use qsamp_ir::IrError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while building or walking a protocol.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Node not found in the protocol.
    #[error("Node not found: {0}")]
    UnknownNode(String),

    /// Node added twice.
    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    /// START and FAIL are created by the builder.
    #[error("Node name is reserved: {0}")]
    ReservedNode(String),

    /// Edge that can never be part of a valid walk.
    #[error("Invalid edge {from} -> {to}: {reason}")]
    InvalidEdge {
        from: String,
        to: String,
        reason: String,
    },

    /// Non-terminal node without a way to obtain a circuit.
    #[error("Node {0} has outgoing edges but no circuit")]
    MissingCircuit(String),

    /// Node with a circuit but no outgoing edge.
    #[error("Node {0} has a circuit but no outgoing edges")]
    DeadEnd(String),

    /// No outgoing check holds.
    #[error("No transition out of {node} for history {history}")]
    NoTransition { node: String, history: String },

    /// More than one outgoing check holds.
    #[error("Ambiguous transition out of {node} to {targets:?} for history {history}")]
    AmbiguousTransition {
        node: String,
        targets: Vec<String>,
        history: String,
    },

    /// A catalog circuit could not be built.
    #[error(transparent)]
    Circuit(#[from] IrError),
}

impl ProtocolError {
    /// Whether this error describes an invalid protocol rather than a missing lookup.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, ProtocolError::UnknownNode(_))
    }
}
