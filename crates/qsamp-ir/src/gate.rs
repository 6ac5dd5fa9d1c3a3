//! Operation symbols.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An operation symbol inside a tick.
///
/// Unknown symbols are kept verbatim as [`Gate::Custom`] so that an
/// executor can reject them at run time with the offending tick.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gate {
    /// Reset to |0⟩.
    Init,
    /// Identity (idle).
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
    /// Hadamard.
    H,
    /// Phase gate.
    S,
    /// Inverse phase gate.
    Sd,
    /// Controlled-NOT, control first.
    Cnot,
    /// Controlled-Z.
    Cz,
    /// Computational-basis measurement.
    Measure,
    /// Any other symbol.
    Custom(String),
}

/// Coarse operation class, used to group fault locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateClass {
    /// State preparation.
    Init,
    /// Single-qubit unitary.
    SingleQubit,
    /// Two-qubit unitary.
    TwoQubit,
    /// Measurement.
    Measure,
    /// Symbol with unknown semantics.
    Other,
}

impl Gate {
    /// Get the symbol of this operation.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Gate::Init => "init",
            Gate::I => "I",
            Gate::X => "X",
            Gate::Y => "Y",
            Gate::Z => "Z",
            Gate::H => "H",
            Gate::S => "S",
            Gate::Sd => "Sd",
            Gate::Cnot => "CNOT",
            Gate::Cz => "CZ",
            Gate::Measure => "measure",
            Gate::Custom(name) => name,
        }
    }

    /// Number of qubits this operation acts on, `None` for custom symbols.
    #[inline]
    pub fn num_qubits(&self) -> Option<usize> {
        match self {
            Gate::Init
            | Gate::I
            | Gate::X
            | Gate::Y
            | Gate::Z
            | Gate::H
            | Gate::S
            | Gate::Sd
            | Gate::Measure => Some(1),
            Gate::Cnot | Gate::Cz => Some(2),
            Gate::Custom(_) => None,
        }
    }

    /// Class of this operation.
    pub fn class(&self) -> GateClass {
        match self {
            Gate::Init => GateClass::Init,
            Gate::Measure => GateClass::Measure,
            Gate::Cnot | Gate::Cz => GateClass::TwoQubit,
            Gate::Custom(_) => GateClass::Other,
            _ => GateClass::SingleQubit,
        }
    }

    /// Whether this is a Pauli operator (including identity).
    pub fn is_pauli(&self) -> bool {
        matches!(self, Gate::I | Gate::X | Gate::Y | Gate::Z)
    }
}

impl From<&str> for Gate {
    fn from(symbol: &str) -> Self {
        match symbol {
            "init" => Gate::Init,
            "I" => Gate::I,
            "X" => Gate::X,
            "Y" => Gate::Y,
            "Z" => Gate::Z,
            "H" => Gate::H,
            "S" => Gate::S,
            "Sd" => Gate::Sd,
            "CNOT" => Gate::Cnot,
            "CZ" => Gate::Cz,
            "measure" => Gate::Measure,
            other => Gate::Custom(other.to_string()),
        }
    }
}

impl From<String> for Gate {
    fn from(symbol: String) -> Self {
        Gate::from(symbol.as_str())
    }
}

impl From<Gate> for String {
    fn from(gate: Gate) -> Self {
        match gate {
            Gate::Custom(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_roundtrip() {
        for gate in [Gate::Init, Gate::X, Gate::Sd, Gate::Cnot, Gate::Measure] {
            assert_eq!(Gate::from(gate.name()), gate);
        }
        assert_eq!(Gate::from("T"), Gate::Custom("T".into()));
    }

    #[test]
    fn test_arity_and_class() {
        assert_eq!(Gate::Cz.num_qubits(), Some(2));
        assert_eq!(Gate::Custom("T".into()).num_qubits(), None);
        assert_eq!(Gate::H.class(), GateClass::SingleQubit);
        assert_eq!(Gate::Init.class(), GateClass::Init);
    }
}
