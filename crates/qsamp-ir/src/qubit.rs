//! Qubit identifiers and operation locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a qubit within a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QubitId(pub u32);

impl QubitId {
    /// Index into a register.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// Where an operation acts: one qubit, or an ordered pair.
///
/// For two-qubit operations the first qubit is the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Single-qubit location.
    Single(QubitId),
    /// Ordered qubit pair.
    Pair(QubitId, QubitId),
}

impl Location {
    /// Number of qubits in this location.
    #[inline]
    pub fn arity(&self) -> usize {
        match self {
            Location::Single(_) => 1,
            Location::Pair(..) => 2,
        }
    }

    /// Qubits touched by this location, in order.
    pub fn qubits(&self) -> impl Iterator<Item = QubitId> + '_ {
        let (a, b) = match *self {
            Location::Single(q) => (q, None),
            Location::Pair(c, t) => (c, Some(t)),
        };
        std::iter::once(a).chain(b)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Single(q) => write!(f, "{}", q.0),
            Location::Pair(c, t) => write!(f, "({}, {})", c.0, t.0),
        }
    }
}

impl From<u32> for Location {
    fn from(q: u32) -> Self {
        Location::Single(QubitId(q))
    }
}

impl From<QubitId> for Location {
    fn from(q: QubitId) -> Self {
        Location::Single(q)
    }
}

impl From<(u32, u32)> for Location {
    fn from((c, t): (u32, u32)) -> Self {
        Location::Pair(QubitId(c), QubitId(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::from(3).to_string(), "3");
        assert_eq!(Location::from((0, 4)).to_string(), "(0, 4)");
        assert_eq!(QubitId(2).to_string(), "q2");
    }

    #[test]
    fn test_location_qubits() {
        let pair = Location::from((1, 2));
        assert_eq!(pair.arity(), 2);
        assert_eq!(pair.qubits().collect::<Vec<_>>(), vec![QubitId(1), QubitId(2)]);
    }
}
