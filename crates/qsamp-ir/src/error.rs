//! Error types for the IR crate.

use crate::circuit::CircuitId;
use crate::qubit::QubitId;
use thiserror::Error;

/// Errors that can occur while building or executing circuits.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Operation applied to a location of the wrong arity.
    #[error("Operation '{gate_name}' requires {expected} qubits, got {got}")]
    QubitCountMismatch {
        /// Name of the operation.
        gate_name: String,
        /// Expected number of qubits.
        expected: usize,
        /// Actual number of qubits provided.
        got: usize,
    },

    /// Duplicate qubit in a two-qubit location.
    #[error("Duplicate qubit {qubit} in location{}", format_gate_context(.gate_name))]
    DuplicateQubit {
        /// The duplicate qubit.
        qubit: QubitId,
        /// Optional operation name for context.
        gate_name: Option<String>,
    },

    /// Tick index outside the circuit.
    #[error("Tick {index} out of range for circuit with {n_ticks} ticks")]
    TickOutOfRange {
        /// Requested tick index.
        index: usize,
        /// Number of ticks in the circuit.
        n_ticks: usize,
    },

    /// Qubit outside the register handed to an executor.
    #[error("Qubit {qubit} out of range for register of {n_qubits} qubits")]
    QubitOutOfRange {
        /// The offending qubit.
        qubit: QubitId,
        /// Register size.
        n_qubits: usize,
    },

    /// An executor met an operation it cannot apply.
    #[error("Unknown operation '{gate_name}' at tick {tick} of circuit {circuit}")]
    UnknownOperation {
        /// Symbol of the operation.
        gate_name: String,
        /// Tick index within the circuit.
        tick: usize,
        /// Circuit the operation belongs to.
        circuit: CircuitId,
    },

    /// Measurement record does not fit into an outcome word.
    #[error("Circuit {circuit} measures {count} bits, at most 64 fit into an outcome")]
    OutcomeOverflow {
        /// Circuit being executed.
        circuit: CircuitId,
        /// Number of measured bits.
        count: usize,
    },
}

/// Helper function to format optional operation context.
#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (operation: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
