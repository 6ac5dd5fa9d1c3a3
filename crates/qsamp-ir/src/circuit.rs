//! Tick-based circuits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::Gate;
use crate::qubit::{Location, QubitId};

/// One time step of a circuit: operation symbol to the locations it acts on.
///
/// Iteration order is deterministic (symbol order, then location order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick {
    ops: BTreeMap<Gate, BTreeSet<Location>>,
}

impl Tick {
    /// Create an empty tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick with `gate` on each of the given single qubits.
    pub fn single(gate: Gate, qubits: impl IntoIterator<Item = u32>) -> IrResult<Self> {
        Self::new().with_single(gate, qubits)
    }

    /// Tick with `gate` on each of the given qubit pairs.
    pub fn pairs(gate: Gate, pairs: impl IntoIterator<Item = (u32, u32)>) -> IrResult<Self> {
        Self::new().with_pairs(gate, pairs)
    }

    /// Add `gate` on the given single qubits.
    pub fn with_single(
        mut self,
        gate: Gate,
        qubits: impl IntoIterator<Item = u32>,
    ) -> IrResult<Self> {
        for q in qubits {
            self.insert(gate.clone(), Location::from(q))?;
        }
        Ok(self)
    }

    /// Add `gate` on the given qubit pairs.
    pub fn with_pairs(
        mut self,
        gate: Gate,
        pairs: impl IntoIterator<Item = (u32, u32)>,
    ) -> IrResult<Self> {
        for pair in pairs {
            self.insert(gate.clone(), Location::from(pair))?;
        }
        Ok(self)
    }

    /// Insert a single operation.
    ///
    /// Rejects locations whose arity does not match the symbol and pairs
    /// that name the same qubit twice.
    pub fn insert(&mut self, gate: Gate, location: Location) -> IrResult<&mut Self> {
        if let Some(expected) = gate.num_qubits() {
            if expected != location.arity() {
                return Err(IrError::QubitCountMismatch {
                    gate_name: gate.name().to_string(),
                    expected,
                    got: location.arity(),
                });
            }
        }
        if let Location::Pair(c, t) = location {
            if c == t {
                return Err(IrError::DuplicateQubit {
                    qubit: c,
                    gate_name: Some(gate.name().to_string()),
                });
            }
        }
        self.ops.entry(gate).or_default().insert(location);
        Ok(self)
    }

    /// Whether the tick holds no operation.
    pub fn is_empty(&self) -> bool {
        self.ops.values().all(BTreeSet::is_empty)
    }

    /// Number of (operation, location) entries.
    pub fn len(&self) -> usize {
        self.ops.values().map(BTreeSet::len).sum()
    }

    /// Iterate over all (operation, location) entries.
    pub fn iter(&self) -> impl Iterator<Item = (&Gate, &Location)> {
        self.ops
            .iter()
            .flat_map(|(gate, locs)| locs.iter().map(move |loc| (gate, loc)))
    }

    /// Locations of a given operation in this tick.
    pub fn locations(&self, gate: &Gate) -> Option<&BTreeSet<Location>> {
        self.ops.get(gate)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (gate, locs) in &self.ops {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            let locs: Vec<String> = locs.iter().map(ToString::to_string).collect();
            write!(f, "{gate} {{{}}}", locs.join(", "))?;
        }
        Ok(())
    }
}

/// Content hash of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitId(pub u64);

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An immutable sequence of ticks.
///
/// The content id and the qubit set are computed once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CircuitData", into = "CircuitData")]
pub struct Circuit {
    ticks: Vec<Tick>,
    noisy: bool,
    ff_deterministic: bool,
    id: CircuitId,
    qubits: BTreeSet<QubitId>,
}

#[derive(Serialize, Deserialize)]
struct CircuitData {
    ticks: Vec<Tick>,
    #[serde(default = "default_noisy")]
    noisy: bool,
    #[serde(default)]
    ff_deterministic: bool,
}

fn default_noisy() -> bool {
    true
}

impl From<CircuitData> for Circuit {
    fn from(data: CircuitData) -> Self {
        Circuit::assemble(data.ticks, data.noisy, data.ff_deterministic)
    }
}

impl From<Circuit> for CircuitData {
    fn from(circuit: Circuit) -> Self {
        CircuitData {
            ticks: circuit.ticks,
            noisy: circuit.noisy,
            ff_deterministic: circuit.ff_deterministic,
        }
    }
}

impl Circuit {
    /// Start building a noisy circuit.
    pub fn builder() -> CircuitBuilder {
        CircuitBuilder::new()
    }

    /// Create a noisy circuit from ticks.
    pub fn from_ticks(ticks: Vec<Tick>) -> Self {
        Self::assemble(ticks, true, false)
    }

    /// Create a circuit of `n_ticks` empty ticks.
    pub fn empty(n_ticks: usize) -> Self {
        Self::assemble(vec![Tick::new(); n_ticks], false, false)
    }

    fn assemble(ticks: Vec<Tick>, noisy: bool, ff_deterministic: bool) -> Self {
        let qubits = ticks
            .iter()
            .flat_map(|tick| tick.iter().flat_map(|(_, loc)| loc.qubits()))
            .collect();
        let mut hasher = FxHasher::default();
        ticks.hash(&mut hasher);
        noisy.hash(&mut hasher);
        ff_deterministic.hash(&mut hasher);
        Self {
            id: CircuitId(hasher.finish()),
            ticks,
            noisy,
            ff_deterministic,
            qubits,
        }
    }

    /// Copy of this circuit with a different `noisy` flag.
    #[must_use]
    pub fn with_noisy(self, noisy: bool) -> Self {
        Self::assemble(self.ticks, noisy, self.ff_deterministic)
    }

    /// Copy of this circuit with a different `ff_deterministic` flag.
    #[must_use]
    pub fn with_ff_deterministic(self, ff_deterministic: bool) -> Self {
        Self::assemble(self.ticks, self.noisy, ff_deterministic)
    }

    /// Content id.
    #[inline]
    pub fn id(&self) -> CircuitId {
        self.id
    }

    /// Whether faults may be injected into this circuit.
    #[inline]
    pub fn noisy(&self) -> bool {
        self.noisy
    }

    /// Whether fault-free execution always yields the same outcome.
    #[inline]
    pub fn ff_deterministic(&self) -> bool {
        self.ff_deterministic
    }

    /// The ticks of this circuit.
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Number of ticks.
    pub fn n_ticks(&self) -> usize {
        self.ticks.len()
    }

    /// Whether every tick is empty.
    pub fn is_empty(&self) -> bool {
        self.ticks.iter().all(Tick::is_empty)
    }

    /// Set of qubits touched by this circuit.
    pub fn qubits(&self) -> &BTreeSet<QubitId> {
        &self.qubits
    }

    /// Register size needed to run this circuit (highest index + 1).
    pub fn width(&self) -> usize {
        self.qubits.last().map_or(0, |q| q.index() + 1)
    }

    /// Iterate over every (tick index, operation, location) of the circuit.
    pub fn locations(&self) -> impl Iterator<Item = (usize, &Gate, &Location)> {
        self.ticks
            .iter()
            .enumerate()
            .flat_map(|(i, tick)| tick.iter().map(move |(gate, loc)| (i, gate, loc)))
    }
}

impl PartialEq for Circuit {
    fn eq(&self, other: &Self) -> bool {
        self.ticks == other.ticks
            && self.noisy == other.noisy
            && self.ff_deterministic == other.ff_deterministic
    }
}

impl Eq for Circuit {}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "circuit {} (noisy: {}, ff_deterministic: {})",
            self.id, self.noisy, self.ff_deterministic
        )?;
        for (i, tick) in self.ticks.iter().enumerate() {
            writeln!(f, "{i:>4}: {tick}")?;
        }
        Ok(())
    }
}

/// Builder for [`Circuit`].
///
/// ```rust
/// use qsamp_ir::{Circuit, Gate};
///
/// let circuit = Circuit::builder()
///     .single(Gate::Init, [0, 1, 2])?
///     .pairs(Gate::Cnot, [(0, 1)])?
///     .single(Gate::Measure, [1])?
///     .build();
/// assert_eq!(circuit.n_ticks(), 3);
/// assert_eq!(circuit.width(), 3);
/// # Ok::<(), qsamp_ir::IrError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    ticks: Vec<Tick>,
    noisy: bool,
    ff_deterministic: bool,
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBuilder {
    /// Create a builder for a noisy, non-deterministic circuit.
    pub fn new() -> Self {
        Self {
            ticks: Vec::new(),
            noisy: true,
            ff_deterministic: false,
        }
    }

    /// Create a builder pre-filled with `n_ticks` empty ticks.
    pub fn with_ticks(n_ticks: usize) -> Self {
        Self {
            ticks: vec![Tick::new(); n_ticks],
            ..Self::new()
        }
    }

    /// Append a prepared tick.
    #[must_use]
    pub fn tick(mut self, tick: Tick) -> Self {
        self.ticks.push(tick);
        self
    }

    /// Append a tick with `gate` on single qubits.
    pub fn single(self, gate: Gate, qubits: impl IntoIterator<Item = u32>) -> IrResult<Self> {
        Ok(self.tick(Tick::single(gate, qubits)?))
    }

    /// Append a tick with `gate` on qubit pairs.
    pub fn pairs(self, gate: Gate, pairs: impl IntoIterator<Item = (u32, u32)>) -> IrResult<Self> {
        Ok(self.tick(Tick::pairs(gate, pairs)?))
    }

    /// Insert an operation into an existing tick.
    pub fn insert(&mut self, index: usize, gate: Gate, location: Location) -> IrResult<&mut Self> {
        let n_ticks = self.ticks.len();
        let tick = self
            .ticks
            .get_mut(index)
            .ok_or(IrError::TickOutOfRange { index, n_ticks })?;
        tick.insert(gate, location)?;
        Ok(self)
    }

    /// Set the `noisy` flag.
    #[must_use]
    pub fn noisy(mut self, noisy: bool) -> Self {
        self.noisy = noisy;
        self
    }

    /// Set the `ff_deterministic` flag.
    #[must_use]
    pub fn ff_deterministic(mut self, ff_deterministic: bool) -> Self {
        self.ff_deterministic = ff_deterministic;
        self
    }

    /// Freeze into an immutable circuit.
    pub fn build(self) -> Circuit {
        Circuit::assemble(self.ticks, self.noisy, self.ff_deterministic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ghz3() -> Circuit {
        Circuit::builder()
            .single(Gate::Init, [0, 1, 2])
            .unwrap()
            .pairs(Gate::Cnot, [(0, 1)])
            .unwrap()
            .pairs(Gate::Cnot, [(1, 2)])
            .unwrap()
            .single(Gate::Measure, [2])
            .unwrap()
            .build()
    }

    #[test]
    fn test_id_is_content_derived() {
        let a = ghz3();
        let b = ghz3();
        assert_eq!(a.id(), b.id());

        let c = ghz3().with_noisy(false);
        assert_ne!(a.id(), c.id());
        let d = ghz3().with_ff_deterministic(true);
        assert_ne!(a.id(), d.id());
    }

    #[test]
    fn test_qubits_memoized() {
        let c = ghz3();
        assert_eq!(c.qubits().len(), 3);
        assert_eq!(c.width(), 3);
        assert_eq!(c.locations().count(), 6);
    }

    #[test]
    fn test_arity_validation() {
        let err = Tick::single(Gate::Cnot, [0]).unwrap_err();
        assert!(matches!(err, IrError::QubitCountMismatch { expected: 2, .. }));

        let err = Tick::pairs(Gate::Cz, [(1, 1)]).unwrap_err();
        assert!(matches!(err, IrError::DuplicateQubit { .. }));
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut builder = CircuitBuilder::with_ticks(2);
        assert!(builder.insert(1, Gate::X, Location::from(0)).is_ok());
        let err = builder.insert(2, Gate::X, Location::from(0)).unwrap_err();
        assert!(matches!(err, IrError::TickOutOfRange { index: 2, n_ticks: 2 }));
    }

    #[test]
    fn test_display() {
        let c = Circuit::builder()
            .tick(
                Tick::single(Gate::Init, [0, 1])
                    .unwrap()
                    .with_pairs(Gate::Cnot, [(0, 1)])
                    .unwrap(),
            )
            .build();
        let text = c.to_string();
        assert!(text.contains("init {0, 1}; CNOT {(0, 1)}"), "{text}");
    }
}
